use std::fmt;
use std::net::IpAddr;

/// Transport protocol of a tracked flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
    /// Anything the cleaner does not track (icmp, sctp, ...)
    Unknown,
}

impl Protocol {
    /// Map a conntrack protocol name (`tcp`, `udp`, ...) to a protocol.
    pub fn from_name(name: &str) -> Self {
        match name {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => Protocol::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one conntrack entry at one sampling instant.
///
/// Only the original-direction tuple is kept; the reply tuple reported by
/// conntrack is redundant for identification and deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnRecord {
    pub protocol: Protocol,
    /// Seconds until the kernel expires the entry, as reported at sampling time
    pub expiry: u64,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub sport: u16,
    pub dport: u16,
}

impl ConnRecord {
    pub fn new(
        protocol: Protocol,
        expiry: u64,
        src: IpAddr,
        sport: u16,
        dst: IpAddr,
        dport: u16,
    ) -> Self {
        Self { protocol, expiry, src, dst, sport, dport }
    }
}

impl fmt::Display for ConnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} -> {}:{} (expiry {}s)",
            self.protocol, self.src, self.sport, self.dst, self.dport, self.expiry
        )
    }
}
