use bytes::Bytes;
use crate::config::CorrelationMode;
use crate::correlation_id::CorrelationId;
use crate::packet_header::{Datagram, PacketKind};
use crate::record::InFlightRecord;

/// The value an ACK is matched on. [MatchKey::matches] is a pure comparison, so it can be used
///  as the predicate for [crate::window::Window::remove_matching] inside the critical section.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MatchKey {
    CorrelationId(CorrelationId),
    Payload(Bytes),
}

impl MatchKey {
    pub fn matches(&self, record: &InFlightRecord) -> bool {
        match self {
            MatchKey::CorrelationId(id) => record.correlation_id() == *id,
            MatchKey::Payload(payload) => record.payload() == payload.as_ref(),
        }
    }
}

/// Decides whether an incoming datagram is an acknowledgment, and which in-flight record it
///  satisfies.
#[derive(Clone, Copy, Debug)]
pub struct AckCorrelator {
    mode: CorrelationMode,
}

impl AckCorrelator {
    pub fn new(mode: CorrelationMode) -> AckCorrelator {
        AckCorrelator { mode }
    }

    pub fn mode(&self) -> CorrelationMode {
        self.mode
    }

    /// ACKs are told apart from data by the kind flag in the packet header - the payload itself
    ///  carries no tag
    pub fn is_ack(&self, datagram: &Datagram) -> bool {
        datagram.header.kind == PacketKind::Ack
    }

    pub fn match_key(&self, datagram: &Datagram) -> MatchKey {
        match self.mode {
            CorrelationMode::CorrelationId => MatchKey::CorrelationId(datagram.header.correlation_id),
            CorrelationMode::PayloadContent => MatchKey::Payload(datagram.payload.clone()),
        }
    }

    /// Builds the ACK for a received data datagram: same correlation id, payload echoed. Echoing
    ///  the payload lets the sender match in either mode.
    pub fn ack_for(data: &Datagram) -> Bytes {
        Datagram::encode(PacketKind::Ack, data.header.correlation_id, &data.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use rstest::rstest;
    use crate::packet_header::PacketHeader;

    fn record(id: u64, payload: &[u8]) -> InFlightRecord {
        InFlightRecord::create(SocketAddr::from(([1,2,3,4], 9)), CorrelationId::from_raw(id), payload, Duration::from_millis(500))
    }

    fn datagram(kind: PacketKind, id: u64, payload: &[u8]) -> Datagram {
        Datagram {
            header: PacketHeader::new(kind, CorrelationId::from_raw(id)),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[rstest]
    #[case::data(PacketKind::Data, false)]
    #[case::ack(PacketKind::Ack, true)]
    fn test_is_ack(#[case] kind: PacketKind, #[case] expected: bool) {
        for mode in [CorrelationMode::CorrelationId, CorrelationMode::PayloadContent] {
            assert_eq!(AckCorrelator::new(mode).is_ack(&datagram(kind, 1, b"abc")), expected);
        }
    }

    #[rstest]
    #[case::same_id_same_payload(CorrelationMode::CorrelationId, 5, b"abc", true)]
    #[case::same_id_other_payload(CorrelationMode::CorrelationId, 5, b"xyz", true)]
    #[case::other_id_same_payload(CorrelationMode::CorrelationId, 6, b"abc", false)]
    #[case::payload_same_id_same_payload(CorrelationMode::PayloadContent, 5, b"abc", true)]
    #[case::payload_other_id_same_payload(CorrelationMode::PayloadContent, 6, b"abc", true)]
    #[case::payload_same_id_other_payload(CorrelationMode::PayloadContent, 5, b"abd", false)]
    #[case::payload_prefix(CorrelationMode::PayloadContent, 5, b"ab", false)]
    fn test_match_key(#[case] mode: CorrelationMode, #[case] ack_id: u64, #[case] ack_payload: &[u8], #[case] expected: bool) {
        let correlator = AckCorrelator::new(mode);
        assert_eq!(correlator.mode(), mode);
        let key = correlator.match_key(&datagram(PacketKind::Ack, ack_id, ack_payload));
        assert_eq!(key.matches(&record(5, b"abc")), expected);
    }

    #[test]
    fn test_ack_for_echoes_id_and_payload() {
        let data = datagram(PacketKind::Data, 77, b"hello");
        let ack = Datagram::deser(AckCorrelator::ack_for(&data)).unwrap();

        assert_eq!(ack.header, PacketHeader::new(PacketKind::Ack, CorrelationId::from_raw(77)));
        assert_eq!(ack.payload.as_ref(), b"hello");

        // the ack satisfies the original record in both modes
        for mode in [CorrelationMode::CorrelationId, CorrelationMode::PayloadContent] {
            assert!(AckCorrelator::new(mode).match_key(&ack).matches(&record(77, b"hello")));
        }
    }
}
