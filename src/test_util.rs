use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use crate::correlation_id::CorrelationId;
use crate::datagram_dispatcher::DatagramDispatcher;
use crate::packet_header::{Datagram, PacketKind};
use crate::transport::Transport;

#[derive(Clone, Debug)]
pub struct SentDatagram {
    pub to: SocketAddr,
    pub datagram: Datagram,
    pub at: Instant,
}

/// A [Transport] that remembers everything it was asked to send, for assertions on counts and
///  timing that are awkward to express with mock expectations. It can be switched to failing
///  every send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentDatagram>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentDatagram> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_data(&self, correlation_id: CorrelationId) -> Vec<SentDatagram> {
        self.sent().into_iter()
            .filter(|s| s.datagram.header.kind == PacketKind::Data && s.datagram.header.correlation_id == correlation_id)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, to: SocketAddr, datagram: &[u8]) -> anyhow::Result<()> {
        let datagram = Datagram::deser(Bytes::copy_from_slice(datagram))?;
        self.sent.lock().unwrap().push(SentDatagram {
            to,
            datagram,
            at: Instant::now(),
        });

        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("simulated send failure");
        }
        Ok(())
    }
}

/// Collects delivered payloads
#[derive(Default)]
pub struct CollectingDispatcher {
    pub received: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
}

#[async_trait]
impl DatagramDispatcher for CollectingDispatcher {
    async fn on_datagram(&self, sender_addr: SocketAddr, payload: &[u8]) {
        self.received.lock().unwrap().push((sender_addr, payload.to_vec()));
    }
}

pub fn test_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
