use std::net::SocketAddr;
use std::sync::Arc;
use bytes::Bytes;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use crate::ack_correlator::AckCorrelator;
use crate::config::ArqConfig;
use crate::correlation_id::{CorrelationId, CorrelationIdGenerator};
use crate::datagram_dispatcher::DatagramDispatcher;
use crate::error::ArqError;
use crate::packet_header::Datagram;
use crate::record::InFlightRecord;
use crate::retransmit::{LoopState, Retransmitter};
use crate::transport::Transport;
use crate::window::{SharedWindow, SlotSnapshot, Window};

/// What happened to a datagram handed to [ArqSession::send_reliable]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Delivery {
    /// The datagram is in the window and will be retransmitted until it is acknowledged or the
    ///  session is stopped.
    Tracked(CorrelationId),
    /// The window was full. The datagram was sent once, but will never be retransmitted.
    Untracked,
}

/// A reliable-delivery session: one window, one retransmission loop, one transport.
///
/// All state lives here rather than in globals; senders, the receive path and the loop task
///  share it through `Arc` handles.
pub struct ArqSession {
    config: Arc<ArqConfig>,
    window: SharedWindow,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<dyn DatagramDispatcher>,
    correlator: AckCorrelator,
    correlation_ids: CorrelationIdGenerator,
    /// set by [ArqSession::stop], cleared by [ArqSession::start]
    shutdown: watch::Sender<bool>,
    state: watch::Sender<LoopState>,
    loop_handle: RwLock<Option<JoinHandle<usize>>>,
}

impl ArqSession {
    pub fn new(
        config: Arc<ArqConfig>,
        transport: Arc<dyn Transport>,
        dispatcher: Arc<dyn DatagramDispatcher>,
    ) -> anyhow::Result<ArqSession> {
        config.validate()?;

        let (shutdown, _) = watch::channel(false);
        let (state, _) = watch::channel(LoopState::Stopped);

        Ok(ArqSession {
            window: Window::new_shared(config.window_size),
            correlator: AckCorrelator::new(config.correlation_mode),
            config,
            transport,
            dispatcher,
            correlation_ids: CorrelationIdGenerator::default(),
            shutdown,
            state,
            loop_handle: Default::default(),
        })
    }

    pub fn config(&self) -> &ArqConfig {
        self.config.as_ref()
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Spawns the retransmission loop. Only a single loop per session is supported - calling this
    ///  while a loop is active fails with [ArqError::AlreadyRunning].
    pub async fn start(&self) -> Result<(), ArqError> {
        let mut loop_handle = self.loop_handle.write().await;
        if loop_handle.is_some() {
            return Err(ArqError::AlreadyRunning);
        }

        self.shutdown.send_replace(false);
        let retransmitter = Retransmitter::new(self.config.clone(), self.window.clone(), self.transport.clone());
        *loop_handle = Some(tokio::spawn(retransmitter.run(self.shutdown.subscribe())));
        self.state.send_replace(LoopState::Running);

        info!("reliable delivery session started, correlating ACKs by {:?}", self.correlator.mode());
        Ok(())
    }

    /// Signals shutdown and waits for the retransmission loop to finish. When this returns, every
    ///  record that was still in flight has been released (without a final resend), and no further
    ///  resends will happen. Returns the number of released records.
    ///
    /// From now on, [ArqSession::send_reliable] is rejected until the session is started again.
    pub async fn stop(&self) -> usize {
        let mut loop_handle = self.loop_handle.write().await;
        self.shutdown.send_replace(true);

        let released = match loop_handle.take() {
            Some(handle) => {
                self.state.send_replace(LoopState::Stopping);
                match handle.await {
                    Ok(released) => released,
                    Err(e) => {
                        error!("retransmission loop terminated abnormally: {}", e);
                        self.window.write().await.drain().len()
                    }
                }
            }
            None => {
                // not running, but there may be records from sends before the first start
                self.window.write().await.drain().len()
            }
        };

        self.state.send_replace(LoopState::Stopped);
        info!("reliable delivery session stopped, {} unacknowledged datagrams dropped", released);
        released
    }

    /// Sends a datagram, tracking it for retransmission if there is room in the window. The
    ///  datagram is sent exactly once from here - tracked or not - and transport failures are
    ///  logged rather than returned: a tracked datagram is retried after the regular timeout, an
    ///  untracked one is lost.
    pub async fn send_reliable(&self, to: SocketAddr, payload: &[u8]) -> Result<Delivery, ArqError> {
        let max = self.config.max_payload_len();
        if payload.len() > max {
            debug!("rejecting payload of {} bytes for {:?}, maximum is {}", payload.len(), to, max);
            return Err(ArqError::PayloadTooLarge { len: payload.len(), max });
        }

        let correlation_id = self.correlation_ids.next_id();
        let record = InFlightRecord::create(to, correlation_id, payload, self.config.retransmit_timeout);
        let frame = record.frame().clone();

        let delivery = {
            let mut window = self.window.write().await;
            // checked under the window lock: the loop drains the window under the same lock
            //  after the flag is set, so nothing can slip in behind the drain
            if *self.shutdown.borrow() {
                debug!("rejecting datagram for {:?}: shutdown in progress", to);
                return Err(ArqError::ShutdownInProgress);
            }

            match window.insert(record) {
                Ok(slot) => {
                    trace!("tracking {} for {:?} in slot {}", correlation_id, to, slot);
                    Delivery::Tracked(correlation_id)
                }
                Err(e) => {
                    warn!("{} - sending {} to {:?} without retransmission", e, correlation_id, to);
                    Delivery::Untracked
                }
            }
        };

        if let Err(e) = self.transport.send(to, &frame).await {
            let e = ArqError::Transport { to, source: e };
            match delivery {
                Delivery::Tracked(_) => warn!("{} - {} will be resent after timeout", e, correlation_id),
                Delivery::Untracked => error!("{} - untracked {} is lost", e, correlation_id),
            }
        }

        Ok(delivery)
    }

    /// Entry point for every datagram the transport receives. ACKs release the matching record;
    ///  data is acknowledged to the sender and handed to the dispatcher. Unparsable datagrams and
    ///  ACKs without a matching record are dropped.
    pub async fn on_receive(&self, from: SocketAddr, buf: Bytes) {
        let datagram = match Datagram::deser(buf) {
            Ok(datagram) => datagram,
            Err(e) => {
                debug!("dropping unparsable datagram from {:?}: {}", from, e);
                return;
            }
        };

        if self.correlator.is_ack(&datagram) {
            self.on_ack(from, &datagram).await;
        }
        else {
            self.on_data(from, datagram).await;
        }
    }

    async fn on_ack(&self, from: SocketAddr, datagram: &Datagram) {
        let key = self.correlator.match_key(datagram);
        let removed = self.window.write().await
            .remove_matching(|record| key.matches(record));

        match removed {
            Ok(record) => {
                debug!("{} acknowledged by {:?} after {} transmission(s)", record.correlation_id(), from, record.transmissions());
            }
            Err(e) => {
                debug!("ACK {} from {:?}: {} - ignoring", datagram.header.correlation_id, from, e);
            }
        }
    }

    async fn on_data(&self, from: SocketAddr, datagram: Datagram) {
        trace!("received data {} from {:?}, acknowledging", datagram.header.correlation_id, from);

        let ack = AckCorrelator::ack_for(&datagram);
        if let Err(e) = self.transport.send(from, &ack).await {
            warn!("{}", ArqError::Transport { to: from, source: e });
        }

        self.dispatcher.on_datagram(from, &datagram.payload).await;
    }

    pub async fn in_flight(&self) -> usize {
        self.window.read().await.len()
    }

    /// Current window contents, for diagnostics
    pub async fn window_snapshot(&self) -> Vec<SlotSnapshot> {
        self.window.read().await.snapshot()
    }
}
