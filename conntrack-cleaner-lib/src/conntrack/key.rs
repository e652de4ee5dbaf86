use std::fmt;
use std::net::IpAddr;

use super::record::{ConnRecord, Protocol};

/// Identity of a flow across sampling rounds.
///
/// Built from the original-direction 5-tuple. Field order is fixed, so a flow
/// and its mirror image (source and destination swapped) are distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnKey {
    pub src: IpAddr,
    pub sport: u16,
    pub dst: IpAddr,
    pub dport: u16,
    pub protocol: Protocol,
}

impl From<&ConnRecord> for ConnKey {
    fn from(record: &ConnRecord) -> Self {
        Self {
            src: record.src,
            sport: record.sport,
            dst: record.dst,
            dport: record.dport,
            protocol: record.protocol,
        }
    }
}

impl fmt::Display for ConnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{}",
            SocketFmt(self.src, self.sport),
            SocketFmt(self.dst, self.dport),
            self.protocol
        )
    }
}

/// `ip:port`, with IPv6 addresses bracketed.
struct SocketFmt(IpAddr, u16);

impl fmt::Display for SocketFmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            IpAddr::V4(ip) => write!(f, "{ip}:{}", self.1),
            IpAddr::V6(ip) => write!(f, "[{ip}]:{}", self.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn record(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16) -> ConnRecord {
        ConnRecord::new(
            Protocol::Udp,
            30,
            IpAddr::from(Ipv4Addr::from(src)),
            sport,
            IpAddr::from(Ipv4Addr::from(dst)),
            dport,
        )
    }

    #[test]
    fn test_key_ignores_expiry() {
        let a = record([10, 0, 0, 1], 5000, [10, 0, 0, 2], 6000);
        let mut b = a.clone();
        b.expiry = 5;
        assert_eq!(ConnKey::from(&a), ConnKey::from(&b));
    }

    #[test]
    fn test_swapped_endpoints_are_distinct() {
        let forward = record([10, 0, 0, 1], 5000, [10, 0, 0, 2], 6000);
        let reverse = record([10, 0, 0, 2], 6000, [10, 0, 0, 1], 5000);
        assert_ne!(ConnKey::from(&forward), ConnKey::from(&reverse));
    }

    #[test]
    fn test_swapped_ports_are_distinct() {
        let a = record([10, 0, 0, 1], 5000, [10, 0, 0, 2], 6000);
        let b = record([10, 0, 0, 1], 6000, [10, 0, 0, 2], 5000);
        assert_ne!(ConnKey::from(&a), ConnKey::from(&b));
    }

    #[test]
    fn test_protocol_is_part_of_identity() {
        let udp = record([10, 0, 0, 1], 5000, [10, 0, 0, 2], 6000);
        let mut tcp = udp.clone();
        tcp.protocol = Protocol::Tcp;
        assert_ne!(ConnKey::from(&udp), ConnKey::from(&tcp));
    }

    #[test]
    fn test_display() {
        let key = ConnKey::from(&record([10, 0, 0, 1], 5000, [10, 0, 0, 2], 6000));
        assert_eq!(key.to_string(), "10.0.0.1:5000;10.0.0.2:6000;udp");

        let v6 = ConnKey {
            src: IpAddr::V6(Ipv6Addr::LOCALHOST),
            sport: 1,
            dst: IpAddr::V6(Ipv6Addr::LOCALHOST),
            dport: 2,
            protocol: Protocol::Tcp,
        };
        assert_eq!(v6.to_string(), "[::1]:1;[::1]:2;tcp");
    }
}
