//! A reliable-delivery window ("ARQ core") on top of an unreliable, unordered datagram transport.
//!
//! Every datagram that is sent through [session::ArqSession::send_reliable] is tracked in a
//!  bounded window until a matching acknowledgment arrives. A background task periodically scans
//!  the window and resends every datagram whose retransmission timer expired, restarting the
//!  timer. Records are released when they are acknowledged, or - silently - when the session
//!  is stopped.
//!
//! ## Design goals
//!
//! * Keep it small and predictable: the window has a fixed capacity (10 by default), and all
//!   access goes through a single lock covering the whole table. Scans are O(N), and N is small.
//! * Never block on a full window: if no slot is free, the datagram is sent once *untracked*
//!   and the caller is told so.
//! * Never hold the window lock while doing I/O. The retransmission pass collects what needs
//!   to be resent, releases the lock, and only then talks to the transport.
//! * Explicitly *not* a transport with ordering, congestion or flow control, or exactly-once
//!   semantics. A datagram can be delivered more than once if its ack gets lost, and records
//!   still in flight at shutdown are dropped without a final flush.
//!
//! ## Wire format
//!
//! The only framing is what is needed to tell data from acknowledgments, and to correlate the
//!  two. All numbers in network byte order (BE):
//!
//! ```ascii
//! 0:  protocol version (u8), currently 1
//! 1:  kind (u8):
//!     * 0 DATA
//!     * 1 ACK
//! 2:  correlation id (u64) - assigned by the sender, echoed by the ACK
//! 10: payload
//! ```
//!
//! An ACK echoes the payload of the DATA datagram it acknowledges. That way a peer can
//!  correlate by id (the default), or by payload content for compatibility with senders that
//!  treat two in-flight datagrams with identical content as interchangeable.
//!
//! ## Timing
//!
//! The retransmission timeout and the poll interval of the background task are independent
//!  settings (see [config::ArqConfig]). A record can sit overdue for up to one poll interval
//!  before it is noticed, so the poll interval should be a small fraction of the timeout.
//!
//! ## Related:
//! * Stop-and-wait / selective repeat ARQ: this is selective repeat without a receive window,
//!   i.e. every datagram is acknowledged and retransmitted individually
//! * TFTP: similar per-datagram ack, but lock-step rather than windowed

pub mod config;
pub mod error;
pub mod correlation_id;
pub mod packet_header;
pub mod record;
pub mod window;
pub mod ack_correlator;
pub mod transport;
pub mod retransmit;
pub mod datagram_dispatcher;
pub mod session;
pub mod end_point;

#[cfg(test)]
pub(crate) mod test_util;
