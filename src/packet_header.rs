use anyhow::bail;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::correlation_id::CorrelationId;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacketKind {
    Data,
    Ack,
}
impl PacketKind {
    const DATA: u8 = 0;
    const ACK: u8 = 1;

    fn to_raw(self) -> u8 {
        match self {
            PacketKind::Data => Self::DATA,
            PacketKind::Ack => Self::ACK,
        }
    }

    fn from_raw(raw: u8) -> anyhow::Result<PacketKind> {
        match raw {
            Self::DATA => Ok(PacketKind::Data),
            Self::ACK => Ok(PacketKind::Ack),
            other => bail!("invalid packet kind {}", other),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PacketHeader {
    pub kind: PacketKind,
    pub correlation_id: CorrelationId,
}

impl PacketHeader {
    pub const PROTOCOL_VERSION_1: u8 = 1;

    pub const SERIALIZED_LEN: usize = size_of::<u8>() + size_of::<u8>() + size_of::<u64>();

    pub fn new(kind: PacketKind, correlation_id: CorrelationId) -> PacketHeader {
        PacketHeader {
            kind,
            correlation_id,
        }
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u8(Self::PROTOCOL_VERSION_1);
        buf.put_u8(self.kind.to_raw());
        buf.put_u64(self.correlation_id.to_raw());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<PacketHeader> {
        let protocol_version = buf.try_get_u8()?;
        if protocol_version != Self::PROTOCOL_VERSION_1 {
            bail!("unsupported protocol version {}", protocol_version);
        }
        let kind = PacketKind::from_raw(buf.try_get_u8()?)?;
        let correlation_id = CorrelationId::from_raw(buf.try_get_u64()?);

        Ok(PacketHeader {
            kind,
            correlation_id,
        })
    }
}

/// A parsed datagram as it was received from the transport. The payload shares the receive
///  buffer rather than copying it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datagram {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Datagram {
    pub fn deser(mut buf: Bytes) -> anyhow::Result<Datagram> {
        let header = PacketHeader::deser(&mut buf)?;
        Ok(Datagram {
            header,
            payload: buf,
        })
    }

    /// Serializes header and payload into a single, freshly allocated frame.
    pub fn encode(kind: PacketKind, correlation_id: CorrelationId, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(PacketHeader::SERIALIZED_LEN + payload.len());
        PacketHeader::new(kind, correlation_id).ser(&mut buf);
        buf.put_slice(payload);
        buf.freeze()
    }
}
