use std::net::SocketAddr;
use std::sync::Arc;
use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tracing::trace;

/// This is the abstraction for putting a datagram on the wire, used for original sends, resends
///  and ACKs alike. It is introduced to decouple the reliability logic from the actual socket,
///  and to facilitate mocking the I/O part away for testing.
///
/// Implementations must not retry - a failed send is logged by the caller and retried (if at
///  all) by the retransmission loop after the regular timeout.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, to: SocketAddr, datagram: &[u8]) -> anyhow::Result<()>;
}

#[async_trait]
impl Transport for Arc<UdpSocket> {
    async fn send(&self, to: SocketAddr, datagram: &[u8]) -> anyhow::Result<()> {
        trace!("UDP socket: sending {} bytes to {:?}", datagram.len(), to);

        let num_sent = self.send_to(datagram, to).await?;
        if num_sent != datagram.len() {
            anyhow::bail!("UDP socket sent {} of {} bytes to {:?}", num_sent, datagram.len(), to);
        }
        Ok(())
    }
}
