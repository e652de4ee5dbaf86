use crate::conntrack::{ConnRecord, Protocol};

/// Port of name-resolution traffic; unanswered queries there are expected.
pub const DNS_PORT: u16 = 53;

/// Decision taken right before a stale flow would be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Delete,
    /// UDP flow to or from port 53
    SkipDns,
    /// Both ends on loopback
    SkipLoopback,
}

impl GateVerdict {
    pub fn allows_delete(&self) -> bool {
        matches!(self, GateVerdict::Delete)
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            GateVerdict::Delete => "delete",
            GateVerdict::SkipDns => "dns",
            GateVerdict::SkipLoopback => "loopback",
        }
    }
}

/// Check a stale record against the deletion exemptions, in order.
pub fn evaluate(record: &ConnRecord) -> GateVerdict {
    if record.protocol == Protocol::Udp && (record.sport == DNS_PORT || record.dport == DNS_PORT) {
        return GateVerdict::SkipDns;
    }
    if record.src.is_loopback() && record.dst.is_loopback() {
        return GateVerdict::SkipLoopback;
    }
    GateVerdict::Delete
}

pub fn should_delete(record: &ConnRecord) -> bool {
    evaluate(record).allows_delete()
}
