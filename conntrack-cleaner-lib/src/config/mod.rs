mod env;
mod loader;
mod types;

pub use env::{
    apply_env_overrides, apply_overrides, parse_bool, parse_duration, ENV_DUMP_FREQUENCY,
    ENV_PURGE_THRESHOLD, ENV_RENEWAL_THRESHOLD, ENV_TCP_CLEANING, ENV_UDP_CLEANING,
};
pub use loader::{load_from_path, validate_config};
pub use types::{CleanerConfig, Config, ConntrackConfig, LoggingConfig, TelemetryConfig};
