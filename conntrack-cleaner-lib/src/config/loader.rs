use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{CleanerError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| CleanerError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| CleanerError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.cleaner.sampling_interval_ms == 0 {
        return Err(CleanerError::Config("sampling_interval_ms must be greater than 0".into()));
    }

    if cfg.conntrack.command_timeout_ms == 0 {
        return Err(CleanerError::Config("command_timeout_ms must be greater than 0".into()));
    }

    if cfg.conntrack.binary.as_os_str().is_empty() {
        return Err(CleanerError::Config("conntrack binary must not be empty".into()));
    }

    Ok(())
}
