use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a data datagram on the wire; the peer echoes it in the ACK.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct CorrelationId(u64);

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl CorrelationId {
    pub const ZERO: CorrelationId = CorrelationId(0);

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }
}

/// Hands out monotonically increasing correlation ids, starting at 1. It is shared between all
///  concurrent senders of a session.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    next: AtomicU64,
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self { next: AtomicU64::new(1) }
    }
}

impl CorrelationIdGenerator {
    pub fn next_id(&self) -> CorrelationId {
        // wrapping after 2^64 datagrams is not a practical concern
        CorrelationId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
