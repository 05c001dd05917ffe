use clap::Parser;
use clap_derive::Parser;
use anyhow::anyhow;
use async_trait::async_trait;
use rand::Rng;
use rdp_window::config::ArqConfig;
use rdp_window::datagram_dispatcher::DatagramDispatcher;
use rdp_window::end_point::EndPoint;
use rdp_window::session::Delivery;
use rdp_window::transport::Transport;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::{select, time};
use tracing::{debug, info, Level};

/// Sends a number of datagrams between two endpoints on localhost, dropping a share of all
///  outgoing datagrams (data and ACKs) to exercise retransmission.
#[derive(Parser)]
struct Args {
    #[clap(short, long, default_value_t = 20)]
    count: usize,

    /// probability of dropping any outgoing datagram, between 0.0 and 1.0
    #[clap(short, long, default_value_t = 0.3)]
    loss_rate: f64,

    #[clap(long, default_value_t = ArqConfig::DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

struct LossyTransport {
    socket: Arc<UdpSocket>,
    loss_rate: f64,
}

#[async_trait]
impl Transport for LossyTransport {
    async fn send(&self, to: SocketAddr, datagram: &[u8]) -> anyhow::Result<()> {
        if rand::rng().random_bool(self.loss_rate) {
            debug!("simulating loss of datagram for {:?}", to);
            return Ok(());
        }
        Transport::send(&self.socket, to, datagram).await
    }
}

struct CountingDispatcher {
    name: &'static str,
    count: AtomicUsize,
}

#[async_trait]
impl DatagramDispatcher for CountingDispatcher {
    async fn on_datagram(&self, sender_addr: SocketAddr, payload: &[u8]) {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        info!("{} received {:?} from {:?} ({} so far)", self.name, String::from_utf8_lossy(payload), sender_addr, count);
    }
}

async fn end_point(name: &'static str, config: Arc<ArqConfig>, loss_rate: f64) -> anyhow::Result<(Arc<EndPoint>, Arc<CountingDispatcher>)> {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
    let transport = Arc::new(LossyTransport { socket: socket.clone(), loss_rate });
    let dispatcher = Arc::new(CountingDispatcher { name, count: AtomicUsize::new(0) });

    let end_point = Arc::new(EndPoint::with_transport(socket, transport, config, dispatcher.clone())?);
    end_point.start().await?;
    Ok((end_point, dispatcher))
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !(0.0..=1.0).contains(&args.loss_rate) {
        anyhow::bail!("loss rate must be between 0.0 and 1.0");
    }

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut config = ArqConfig::default();
    config.window_size = args.window_size;
    let config = Arc::new(config);

    let (sender, _) = end_point("sender", config.clone(), args.loss_rate).await?;
    let (receiver, received) = end_point("receiver", config.clone(), args.loss_rate).await?;
    let receiver_addr = receiver.local_addr()?;

    let exchange = async {
        let mut num_untracked = 0;
        for i in 0..args.count {
            if sender.send_reliable(receiver_addr, format!("message {}", i).as_bytes()).await? == Delivery::Untracked {
                num_untracked += 1;
            }
            time::sleep(Duration::from_millis(20)).await;
        }

        // give retransmissions a chance to get through
        time::sleep(config.retransmit_timeout * 4).await;
        Ok::<_, anyhow::Error>(num_untracked)
    };

    let num_untracked = select! {
        _ = sender.recv_loop() => Err(anyhow!("sender's receive loop terminated")),
        _ = receiver.recv_loop() => Err(anyhow!("receiver's receive loop terminated")),
        result = exchange => result,
    }?;

    for slot in sender.session().window_snapshot().await {
        info!("still in flight: {:?}", slot);
    }

    let num_released = sender.stop().await;
    receiver.stop().await;

    info!("sent {} datagrams ({} untracked), {} deliveries at the receiver (duplicates included), {} unacknowledged at shutdown",
        args.count, num_untracked, received.count.load(Ordering::Acquire), num_released);
    Ok(())
}
