#![forbid(unsafe_code)]

pub mod cleaner;
pub mod config;
pub mod conntrack;
pub mod error;
pub mod telemetry;

pub use cleaner::{run, Cleaner, CleanerStats, Producer};
pub use config::{apply_env_overrides, load_from_path, validate_config, CleanerConfig, Config};
pub use conntrack::{ConnKey, ConnRecord, ConntrackCli, Protocol};
pub use error::{CleanerError, Result};
