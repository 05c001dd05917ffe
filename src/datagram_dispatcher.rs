use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use std::net::SocketAddr;

/// Receives the payload of every data datagram that arrives, after it was acknowledged.
///
/// NB: A datagram is delivered again if its ACK got lost and the sender retransmitted it -
///      there is no de-duplication.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DatagramDispatcher: Send + Sync + 'static {
    async fn on_datagram(&self, sender_addr: SocketAddr, payload: &[u8]);
}
