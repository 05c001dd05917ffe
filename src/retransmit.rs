use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio::{select, time};
use tracing::{debug, info, trace, warn};
use crate::config::ArqConfig;
use crate::transport::Transport;
use crate::window::SharedWindow;

/// Lifecycle of the retransmission loop: `Stopped -> Running -> Stopping -> Stopped`
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopState {
    Stopped,
    Running,
    Stopping,
}

/// The background activity that resends every record whose retransmission timer expired.
///
/// Each pass brings all countdowns up to date and restarts the timers of expired records while
///  holding the window lock, and does the actual sending *after* releasing it. A slow transport
///  therefore never stalls senders or the receive path.
pub struct Retransmitter {
    config: Arc<ArqConfig>,
    window: SharedWindow,
    transport: Arc<dyn Transport>,
}

impl Retransmitter {
    pub fn new(config: Arc<ArqConfig>, window: SharedWindow, transport: Arc<dyn Transport>) -> Retransmitter {
        Retransmitter {
            config,
            window,
            transport,
        }
    }

    /// Does a single pass over the window, returning the number of datagrams that were resent.
    ///
    /// A failed resend is logged and otherwise ignored: the record stays in the window with a
    ///  restarted timer, so it is tried again after another full timeout.
    pub async fn run_pass(&self) -> usize {
        let jobs = self.window.write().await
            .collect_expired(Instant::now(), self.config.retransmit_timeout);

        for job in &jobs {
            debug!("resending {} from slot {} to {:?} (transmission #{})", job.correlation_id, job.slot, job.destination, job.transmissions);

            if let Err(e) = self.transport.send(job.destination, &job.frame).await {
                warn!("resending {} to {:?} failed, retrying after the next timeout: {:#}", job.correlation_id, job.destination, e);
            }
        }
        jobs.len()
    }

    /// Runs passes until the shutdown signal is set (or its sender is dropped), then releases all
    ///  records still in the window. Returns the number of released records.
    ///
    /// The signal is checked once per iteration; it cuts the wait between passes short, but a pass
    ///  that is in progress runs to completion.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        info!("starting retransmission loop: timeout {:?}, poll interval {:?}", self.config.retransmit_timeout, self.config.poll_interval);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let num_resent = self.run_pass().await;
            if num_resent > 0 {
                trace!("resent {} datagrams in this pass", num_resent);
            }

            select! {
                _ = time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown signal was dropped - stopping retransmission loop");
                        break;
                    }
                }
            }
        }

        let released = self.window.write().await
            .drain();
        for record in &released {
            debug!("releasing unacknowledged {:?}", record);
        }
        info!("retransmission loop stopped, released {} unacknowledged records", released.len());
        released.len()
    }
}
