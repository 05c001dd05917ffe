use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::time::Duration;
use bytes::Bytes;
use tokio::time::Instant;
use crate::correlation_id::CorrelationId;
use crate::packet_header::{Datagram, PacketHeader, PacketKind};

/// One outstanding datagram awaiting acknowledgment.
///
/// The record owns an independent copy of the datagram: the caller's buffer may be reused or
///  dropped right after the send, long before the record is resent or acknowledged. The record
///  is released by dropping it, which happens exactly once - either when it is removed from the
///  window on an ack, or when the window is drained on shutdown.
pub struct InFlightRecord {
    destination: SocketAddr,
    correlation_id: CorrelationId,
    /// the complete DATA datagram, header included, as it goes on the wire
    frame: Bytes,
    enqueued_at: Instant,
    /// may become negative between two passes of the retransmission loop
    remaining_millis: i64,
    transmissions: u32,
}

impl Debug for InFlightRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "InFlightRecord{{{} to {:?}, {} bytes, {}ms left, sent {}x}}",
               self.correlation_id, self.destination, self.payload().len(), self.remaining_millis, self.transmissions)
    }
}

impl InFlightRecord {
    /// Builds a record for a datagram that is about to be sent for the first time. This always
    ///  succeeds - capacity is the window's business, payload size is checked by the session.
    pub fn create(destination: SocketAddr, correlation_id: CorrelationId, payload: &[u8], retransmit_timeout: Duration) -> InFlightRecord {
        InFlightRecord {
            destination,
            correlation_id,
            frame: Datagram::encode(PacketKind::Data, correlation_id, payload),
            enqueued_at: Instant::now(),
            remaining_millis: duration_to_millis(retransmit_timeout),
            transmissions: 1,
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    pub fn payload(&self) -> &[u8] {
        &self.frame[PacketHeader::SERIALIZED_LEN..]
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    pub fn remaining_millis(&self) -> i64 {
        self.remaining_millis
    }

    pub fn transmissions(&self) -> u32 {
        self.transmissions
    }

    /// Recalculates the countdown from the time elapsed since the record was created or last
    ///  resent. This is idempotent for a given `now`, so passes can run at any frequency.
    pub fn update_remaining(&mut self, now: Instant, retransmit_timeout: Duration) {
        let elapsed = now.saturating_duration_since(self.enqueued_at);
        self.remaining_millis = duration_to_millis(retransmit_timeout) - duration_to_millis(elapsed);
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_millis <= 0
    }

    /// Marks the record as resent at `now`, restarting its timer.
    pub fn restart_timer(&mut self, now: Instant, retransmit_timeout: Duration) {
        self.enqueued_at = now;
        self.remaining_millis = duration_to_millis(retransmit_timeout);
        self.transmissions = self.transmissions.saturating_add(1);
    }
}

fn duration_to_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
