use std::net::SocketAddr;
use std::sync::Arc;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, span, trace, Instrument, Level, Span};
use uuid::Uuid;
use crate::config::ArqConfig;
use crate::datagram_dispatcher::DatagramDispatcher;
use crate::error::ArqError;
use crate::session::{ArqSession, Delivery};
use crate::transport::Transport;

/// EndPoint is the place where the reliable-delivery session meets an actual UDP socket: it
///  listens on the socket, feeding every received datagram into the session, and sends through
///  the same socket so that peers can send their ACKs back to the datagram's source address.
pub struct EndPoint {
    socket: Arc<UdpSocket>,
    session: Arc<ArqSession>,
}

impl EndPoint {
    pub async fn bind(
        addr: SocketAddr,
        config: Arc<ArqConfig>,
        dispatcher: Arc<dyn DatagramDispatcher>,
    ) -> anyhow::Result<EndPoint> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let transport = Arc::new(socket.clone());
        Self::with_transport(socket, transport, config, dispatcher)
    }

    /// Receives on `socket`, but sends through `transport` - e.g. for wrapping the socket with
    ///  instrumentation or simulated loss.
    pub fn with_transport(
        socket: Arc<UdpSocket>,
        transport: Arc<dyn Transport>,
        config: Arc<ArqConfig>,
        dispatcher: Arc<dyn DatagramDispatcher>,
    ) -> anyhow::Result<EndPoint> {
        info!("bound receive socket to {:?}", socket.local_addr()?);

        Ok(EndPoint {
            socket,
            session: Arc::new(ArqSession::new(config, transport, dispatcher)?),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn session(&self) -> &Arc<ArqSession> {
        &self.session
    }

    pub async fn start(&self) -> Result<(), ArqError> {
        self.session.start().await
    }

    pub async fn stop(&self) -> usize {
        self.session.stop().await
    }

    pub async fn send_reliable(&self, to: SocketAddr, payload: &[u8]) -> Result<Delivery, ArqError> {
        self.session.send_reliable(to, payload).await
    }

    /// Receives datagrams until the surrounding task is dropped. Socket errors are logged, and
    ///  receiving continues.
    pub async fn recv_loop(&self) {
        info!("starting receive loop");

        let max_datagram_size = self.session.config().max_datagram_size;
        // one byte more than the maximum to detect oversized datagrams that the socket truncated
        let mut buf = vec![0u8; max_datagram_size + 1];
        loop {
            let (num_read, from) = match self.socket.recv_from(&mut buf).await {
                Ok(x) => x,
                Err(e) => {
                    error!("socket error: {}", e);
                    continue;
                }
            };

            let correlation_id = Uuid::new_v4();
            let span = span!(Level::TRACE, "datagram_received", ?correlation_id);
            let _entered = span.enter();

            trace!("received datagram from {:?}: {:?}", from, &buf[..num_read]);

            if num_read > max_datagram_size {
                debug!("datagram from {:?} exceeds maximum size of {} bytes - dropping", from, max_datagram_size);
                continue;
            }

            self.session.on_receive(from, Bytes::copy_from_slice(&buf[..num_read]))
                .instrument(Span::current())
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio::time;
    use super::*;
    use crate::config::CorrelationMode;
    use crate::packet_header::{Datagram, PacketKind};
    use crate::correlation_id::CorrelationId;
    use crate::test_util::CollectingDispatcher;

    fn config() -> Arc<ArqConfig> {
        Arc::new(ArqConfig {
            window_size: 4,
            retransmit_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
            max_datagram_size: 64,
            correlation_mode: CorrelationMode::CorrelationId,
        })
    }

    async fn end_point(dispatcher: Arc<CollectingDispatcher>) -> Arc<EndPoint> {
        let end_point = Arc::new(EndPoint::bind(SocketAddr::from(([127, 0, 0, 1], 0)), config(), dispatcher).await.unwrap());
        end_point.start().await.unwrap();

        let recv = end_point.clone();
        tokio::spawn(async move { recv.recv_loop().await });
        end_point
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_round_trip_over_udp() {
        let dispatcher_a = Arc::new(CollectingDispatcher::default());
        let dispatcher_b = Arc::new(CollectingDispatcher::default());
        let a = end_point(dispatcher_a.clone()).await;
        let b = end_point(dispatcher_b.clone()).await;

        let delivery = a.send_reliable(b.local_addr().unwrap(), b"ping").await.unwrap();
        assert!(matches!(delivery, Delivery::Tracked(_)));

        wait_until(|| !dispatcher_b.received.lock().unwrap().is_empty()).await;
        assert_eq!(dispatcher_b.received.lock().unwrap()[0], (a.local_addr().unwrap(), b"ping".to_vec()));

        // b's ACK releases the record on a
        for _ in 0..200 {
            if a.session().in_flight().await == 0 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(a.session().in_flight().await, 0);
        assert!(dispatcher_a.received.lock().unwrap().is_empty());

        assert_eq!(a.stop().await, 0);
        b.stop().await;
    }

    #[tokio::test]
    async fn test_unanswered_datagram_is_resent() {
        let a = end_point(Arc::new(CollectingDispatcher::default())).await;

        // a plain socket that never acknowledges
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        a.send_reliable(silent.local_addr().unwrap(), b"hello?").await.unwrap();

        let mut buf = [0u8; 64];
        for _ in 0..2 {
            let (len, from) = silent.recv_from(&mut buf).await.unwrap();
            assert_eq!(from, a.local_addr().unwrap());
            let datagram = Datagram::deser(Bytes::copy_from_slice(&buf[..len])).unwrap();
            assert_eq!(datagram.header.kind, PacketKind::Data);
            assert_eq!(datagram.header.correlation_id, CorrelationId::from_raw(1));
            assert_eq!(datagram.payload.as_ref(), b"hello?");
        }

        // acknowledging by hand stops the retransmissions
        let ack = Datagram::encode(PacketKind::Ack, CorrelationId::from_raw(1), b"hello?");
        silent.send_to(&ack, a.local_addr().unwrap()).await.unwrap();
        for _ in 0..200 {
            if a.session().in_flight().await == 0 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(a.session().in_flight().await, 0);

        a.stop().await;
    }

    #[tokio::test]
    async fn test_oversized_datagram_is_dropped() {
        let dispatcher = Arc::new(CollectingDispatcher::default());
        let a = end_point(dispatcher.clone()).await;

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let oversized = Datagram::encode(PacketKind::Data, CorrelationId::from_raw(1), &[0; 100]);
        sender.send_to(&oversized, a.local_addr().unwrap()).await.unwrap();
        let fitting = Datagram::encode(PacketKind::Data, CorrelationId::from_raw(2), b"ok");
        sender.send_to(&fitting, a.local_addr().unwrap()).await.unwrap();

        // only the second one is acknowledged and delivered
        let mut buf = [0u8; 128];
        let (len, _) = sender.recv_from(&mut buf).await.unwrap();
        let ack = Datagram::deser(Bytes::copy_from_slice(&buf[..len])).unwrap();
        assert_eq!(ack.header.kind, PacketKind::Ack);
        assert_eq!(ack.header.correlation_id, CorrelationId::from_raw(2));

        wait_until(|| !dispatcher.received.lock().unwrap().is_empty()).await;
        assert_eq!(dispatcher.received.lock().unwrap().len(), 1);

        a.stop().await;
    }
}
