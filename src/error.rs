use std::net::SocketAddr;

use thiserror::Error;

/// Outcome of an operation on the [crate::window::Window]. Neither variant is fatal: a full
///  window means the datagram goes out untracked, and an unmatched ack is ignored.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum WindowError {
    #[error("window is full - all {0} slots are occupied")]
    Full(usize),

    #[error("no in-flight record matches")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ArqError {
    #[error("session is shutting down - not accepting datagrams")]
    ShutdownInProgress,

    #[error("the retransmission loop is already running")]
    AlreadyRunning,

    #[error("payload of {len} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("sending to {to} failed: {source:#}")]
    Transport {
        to: SocketAddr,
        #[source]
        source: anyhow::Error,
    },
}
