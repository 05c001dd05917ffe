use std::time::Duration;
use anyhow::bail;
use crate::packet_header::PacketHeader;

/// Selects how an incoming ACK is matched against the records in the window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CorrelationMode {
    /// An ACK satisfies the record with the same correlation id. This is the default.
    CorrelationId,
    /// An ACK satisfies the first record (in slot order) whose payload is byte-identical to the
    ///  ACK's payload, regardless of correlation id. Acknowledging 'the wrong' record with
    ///  identical content is treated as harmless.
    PayloadContent,
}

#[derive(Debug)]
pub struct ArqConfig {
    /// This is the maximum number of datagrams that are tracked concurrently. Datagrams sent
    ///  while the window is full go out exactly once, without retransmission.
    pub window_size: usize,

    /// Time after which an unacknowledged datagram is resent. The timer restarts with every
    ///  resend.
    pub retransmit_timeout: Duration,

    /// Time the background task waits between two passes over the window. This is independent
    ///  of the timeout, but a record can sit overdue for up to one poll interval, so it should
    ///  be significantly smaller than `retransmit_timeout`.
    pub poll_interval: Duration,

    /// This is the size of the UDP payload, i.e. the datagram *including* the packet header.
    ///  Application payloads are limited to this minus [PacketHeader::SERIALIZED_LEN].
    ///
    /// With full Ethernet frames and no optional IP headers, this is `1500 - 20 - 8 = 1472`
    ///  for IPV4.
    pub max_datagram_size: usize,

    pub correlation_mode: CorrelationMode,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self::default_ipv4()
    }
}

impl ArqConfig {
    pub const DEFAULT_WINDOW_SIZE: usize = 10;
    pub const DEFAULT_RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(500);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// defaults for ipv4 with end-to-end full Ethernet MTU - without optional headers
    pub fn default_ipv4() -> ArqConfig {
        ArqConfig {
            window_size: Self::DEFAULT_WINDOW_SIZE,
            retransmit_timeout: Self::DEFAULT_RETRANSMIT_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            max_datagram_size: 1472,
            correlation_mode: CorrelationMode::CorrelationId,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_size == 0 {
            bail!("window size must be at least 1");
        }
        if self.retransmit_timeout.is_zero() {
            bail!("retransmit timeout must not be zero");
        }
        if self.poll_interval.is_zero() {
            bail!("poll interval must not be zero");
        }
        if self.poll_interval > self.retransmit_timeout {
            bail!("poll interval {:?} exceeds retransmit timeout {:?} - records would sit overdue for longer than the timeout itself", self.poll_interval, self.retransmit_timeout);
        }
        if self.max_datagram_size <= PacketHeader::SERIALIZED_LEN {
            bail!("datagram size {} cannot hold the packet header of {} bytes", self.max_datagram_size, PacketHeader::SERIALIZED_LEN);
        }
        Ok(())
    }

    pub fn max_payload_len(&self) -> usize {
        self.max_datagram_size - PacketHeader::SERIALIZED_LEN
    }
}
