//! Environment overrides for the cleaner settings.
//!
//! Every variable is optional. An unset or malformed variable keeps the value
//! already in the configuration (the built-in default unless a config file set
//! it) and logs a warning; it never aborts startup.

use std::fmt::Debug;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::CleanerConfig;

pub const ENV_DUMP_FREQUENCY: &str = "CONNTRACK_TABLE_DUMP_FREQUENCY";
pub const ENV_PURGE_THRESHOLD: &str = "CONNTRACK_PURGE_THRESHOLD";
pub const ENV_RENEWAL_THRESHOLD: &str = "CONNECTION_RENEWAL_THRESHOLD";
pub const ENV_UDP_CLEANING: &str = "UDP_CLEANING_ENABLED";
pub const ENV_TCP_CLEANING: &str = "TCP_CLEANING_ENABLED";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(cfg: &mut CleanerConfig) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` to resolve variable names.
pub fn apply_overrides<F>(cfg: &mut CleanerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ms) = read(&lookup, ENV_DUMP_FREQUENCY, cfg.sampling_interval_ms, |raw| {
        parse_duration(raw).map(as_millis).filter(|ms| *ms > 0)
    }) {
        cfg.sampling_interval_ms = ms;
    }

    if let Some(ms) = read(&lookup, ENV_PURGE_THRESHOLD, cfg.purge_threshold_ms, |raw| {
        parse_duration(raw).map(as_millis)
    }) {
        cfg.purge_threshold_ms = ms;
    }

    if let Some(threshold) = read(&lookup, ENV_RENEWAL_THRESHOLD, cfg.renewal_threshold, |raw| {
        raw.trim().parse::<u32>().ok()
    }) {
        cfg.renewal_threshold = threshold;
    }

    if let Some(enabled) = read(&lookup, ENV_UDP_CLEANING, cfg.udp_enabled, parse_bool) {
        cfg.udp_enabled = enabled;
    }

    if let Some(enabled) = read(&lookup, ENV_TCP_CLEANING, cfg.tcp_enabled, parse_bool) {
        cfg.tcp_enabled = enabled;
    }
}

fn read<F, T, P>(lookup: &F, name: &str, current: T, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: Debug,
    P: Fn(&str) -> Option<T>,
{
    let Some(raw) = lookup(name) else {
        warn!(variable = name, value = ?current, "environment variable not set, keeping configured value");
        return None;
    };

    match parse(&raw) {
        Some(value) => {
            debug!(variable = name, ?value, "environment override applied");
            Some(value)
        }
        None => {
            warn!(variable = name, raw = %raw, value = ?current, "invalid environment value, keeping configured value");
            None
        }
    }
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Parse a duration such as `300ms`, `1s`, `1m30s` or `1.5h`.
///
/// Units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`. A bare `0` is accepted.
/// Negative durations are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut rest = s;
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let value: f64 = rest.get(..number_end)?.parse().ok()?;
        rest = rest.get(number_end..)?;

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match rest.get(..unit_end)? {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = rest.get(unit_end..)?;

        nanos += value * scale;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos as u64))
}

/// Boolean spellings accepted in deployment manifests: `1`, `t`, `true`, `0`, `f`, `false` and case variants.
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("10ns"), Some(Duration::from_nanos(10)));
    }

    #[test]
    fn test_parse_duration_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5h"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration(" 0 "), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("s"), None);
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("1d"), None);
        assert_eq!(parse_duration("1..5s"), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("F"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_unset_variables_keep_defaults() {
        let mut cfg = CleanerConfig::default();
        apply_overrides(&mut cfg, |_| None);
        assert_eq!(cfg, CleanerConfig::default());
    }

    #[test]
    fn test_valid_overrides_apply() {
        let vars = env(&[
            (ENV_DUMP_FREQUENCY, "500ms"),
            (ENV_PURGE_THRESHOLD, "2m"),
            (ENV_RENEWAL_THRESHOLD, "3"),
            (ENV_UDP_CLEANING, "false"),
            (ENV_TCP_CLEANING, "true"),
        ]);
        let mut cfg = CleanerConfig::default();
        apply_overrides(&mut cfg, |name| vars.get(name).cloned());

        assert_eq!(cfg.sampling_interval_ms, 500);
        assert_eq!(cfg.purge_threshold_ms, 120_000);
        assert_eq!(cfg.renewal_threshold, 3);
        assert!(!cfg.udp_enabled);
        assert!(cfg.tcp_enabled);
    }

    #[test]
    fn test_malformed_overrides_fall_back() {
        let vars = env(&[
            (ENV_DUMP_FREQUENCY, "0s"),
            (ENV_PURGE_THRESHOLD, "soon"),
            (ENV_RENEWAL_THRESHOLD, "-1"),
            (ENV_UDP_CLEANING, "maybe"),
            (ENV_TCP_CLEANING, ""),
        ]);
        let mut cfg = CleanerConfig::default();
        apply_overrides(&mut cfg, |name| vars.get(name).cloned());
        assert_eq!(cfg, CleanerConfig::default());
    }

    #[test]
    fn test_malformed_override_keeps_file_value() {
        let vars = env(&[(ENV_RENEWAL_THRESHOLD, "lots")]);
        let mut cfg = CleanerConfig { renewal_threshold: 7, ..CleanerConfig::default() };
        apply_overrides(&mut cfg, |name| vars.get(name).cloned());
        assert_eq!(cfg.renewal_threshold, 7);
    }
}
