use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::conntrack::Protocol;

/// Staleness detection configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CleanerConfig {
    /// Pause between two conntrack table dumps, in milliseconds
    /// Default: 1000 (1 second)
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_ms: u64,
    /// Maximum age of a tracked flow before it is forgotten, in milliseconds
    /// Forgetting only drops local tracking state; it never deletes the kernel entry
    /// Default: 60000 (60 seconds)
    #[serde(default = "default_purge_threshold")]
    pub purge_threshold_ms: u64,
    /// Number of non-decreasing expiry observations tolerated before a flow is deleted
    /// A flow is deleted on observation `renewal_threshold + 1`
    /// Default: 0
    #[serde(default)]
    pub renewal_threshold: u32,
    /// Track unanswered UDP flows
    /// Default: true
    #[serde(default = "default_true")]
    pub udp_enabled: bool,
    /// Track unanswered TCP flows
    /// Default: false
    #[serde(default)]
    pub tcp_enabled: bool,
}

impl CleanerConfig {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn purge_threshold(&self) -> Duration {
        Duration::from_millis(self.purge_threshold_ms)
    }

    /// Whether records of this protocol enter the pipeline at all.
    pub fn tracks(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Tcp => self.tcp_enabled,
            Protocol::Udp => self.udp_enabled,
            Protocol::Unknown => false,
        }
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval(),
            purge_threshold_ms: default_purge_threshold(),
            renewal_threshold: 0,
            udp_enabled: true,
            tcp_enabled: false,
        }
    }
}

/// `conntrack` tool invocation settings
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ConntrackConfig {
    /// Path or name of the conntrack binary
    /// Default: "conntrack" (resolved through PATH)
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    /// Upper bound for a single conntrack invocation, in milliseconds
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
}

impl Default for ConntrackConfig {
    fn default() -> Self {
        Self { binary: default_binary(), command_timeout_ms: default_command_timeout() }
    }
}

/// Logging configuration
/// Controls application-level structured logging (stdout/stderr)
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    /// Can be overridden at runtime via RUST_LOG environment variable
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Observability server port (optional)
    /// If provided, serves Prometheus metrics and health checks on this port
    /// Default: None (server disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
    /// OpenTelemetry internal log level
    /// Default: "warn"
    #[serde(default = "default_otel_log_level")]
    pub otel_log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { metrics_port: None, otel_log_level: default_otel_log_level() }
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default)]
    pub conntrack: ConntrackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_sampling_interval() -> u64 {
    1000
}

fn default_purge_threshold() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

fn default_binary() -> PathBuf {
    PathBuf::from("conntrack")
}

fn default_command_timeout() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_log_level() -> String {
    "warn".to_string()
}
