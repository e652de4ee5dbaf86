//! Decoder for `conntrack -L` output.
//!
//! A line looks like:
//!
//! ```text
//! udp      17 13 src=10.0.0.1 dst=10.0.0.2 sport=5000 dport=6000 [UNREPLIED] src=10.0.0.2 dst=10.0.0.1 sport=6000 dport=5000 mark=0 use=1
//! tcp      6 86 SYN_SENT src=10.0.0.1 dst=10.0.0.2 sport=55162 dport=14250 [UNREPLIED] src=10.0.0.2 dst=10.0.0.1 sport=14250 dport=55162 mark=0 use=1
//! ```
//!
//! Lines read from `/proc/net/nf_conntrack` carry an extra `ipv4 2` /
//! `ipv6 10` prefix, which is skipped. The first occurrence of each tuple
//! field belongs to the original direction.

use std::net::IpAddr;

use thiserror::Error;

use super::record::{ConnRecord, Protocol};

const SRC: &str = "src=";
const DST: &str = "dst=";
const SPORT: &str = "sport=";
const DPORT: &str = "dport=";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,
    #[error("unsupported protocol '{0}'")]
    UnsupportedProtocol(String),
    #[error("missing expiry")]
    MissingExpiry,
    #[error("invalid expiry '{0}'")]
    InvalidExpiry(String),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid address '{value}' for '{field}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("invalid port '{value}' for '{field}'")]
    InvalidPort { field: &'static str, value: String },
}

impl DecodeError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::Empty => "empty",
            DecodeError::UnsupportedProtocol(_) => "unsupported_protocol",
            DecodeError::MissingExpiry | DecodeError::InvalidExpiry(_) => "expiry",
            DecodeError::MissingField(_) => "missing_field",
            DecodeError::InvalidAddress { .. } => "address",
            DecodeError::InvalidPort { .. } => "port",
        }
    }
}

/// Decode one conntrack line into a record.
pub fn parse_line(line: &str) -> Result<ConnRecord, DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let first = tokens.first().ok_or(DecodeError::Empty)?;

    let start = if matches!(*first, "ipv4" | "ipv6") { 2 } else { 0 };

    let name = tokens.get(start).ok_or(DecodeError::Empty)?;
    let protocol = Protocol::from_name(name);
    if protocol == Protocol::Unknown {
        return Err(DecodeError::UnsupportedProtocol((*name).to_string()));
    }

    // Protocol number sits between the name and the expiry.
    let expiry_token = tokens
        .get(start.saturating_add(2))
        .ok_or(DecodeError::MissingExpiry)?;
    let expiry = expiry_token
        .parse::<u64>()
        .map_err(|_| DecodeError::InvalidExpiry((*expiry_token).to_string()))?;

    let rest = tokens.get(start.saturating_add(3)..).unwrap_or_default();

    let src = address(rest, SRC)?;
    let dst = address(rest, DST)?;
    let sport = port(rest, SPORT)?;
    let dport = port(rest, DPORT)?;

    Ok(ConnRecord::new(protocol, expiry, src, sport, dst, dport))
}

/// Decode a whole table dump, pairing each non-blank line with its result.
pub fn parse_table(
    table: &str,
) -> impl Iterator<Item = (&str, Result<ConnRecord, DecodeError>)> + '_ {
    table
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| (line, parse_line(line)))
}

fn field<'a>(tokens: &[&'a str], prefix: &'static str) -> Result<&'a str, DecodeError> {
    tokens
        .iter()
        .find_map(|t| t.strip_prefix(prefix))
        .ok_or(DecodeError::MissingField(prefix))
}

fn address(tokens: &[&str], prefix: &'static str) -> Result<IpAddr, DecodeError> {
    let value = field(tokens, prefix)?;
    value
        .parse()
        .map_err(|_| DecodeError::InvalidAddress { field: prefix, value: value.to_string() })
}

fn port(tokens: &[&str], prefix: &'static str) -> Result<u16, DecodeError> {
    let value = field(tokens, prefix)?;
    value
        .parse()
        .map_err(|_| DecodeError::InvalidPort { field: prefix, value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        assert_eq!(DecodeError::Empty.reason(), "empty");
        assert_eq!(DecodeError::MissingExpiry.reason(), "expiry");
        assert_eq!(DecodeError::InvalidExpiry("x".into()).reason(), "expiry");
        assert_eq!(DecodeError::MissingField(SRC).reason(), "missing_field");
    }

    #[test]
    fn test_field_takes_first_occurrence() {
        let tokens = ["src=1.1.1.1", "src=2.2.2.2"];
        assert_eq!(field(&tokens, SRC), Ok("1.1.1.1"));
    }

    #[test]
    fn test_field_prefixes_do_not_overlap() {
        let tokens = ["sport=1", "dport=2", "dst=3.3.3.3"];
        assert_eq!(field(&tokens, SRC), Err(DecodeError::MissingField(SRC)));
    }
}
