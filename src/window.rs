use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};
use crate::correlation_id::CorrelationId;
use crate::error::WindowError;
use crate::record::InFlightRecord;

/// The window is shared between senders, the receive path and the retransmission loop. All
///  mutations go through the write lock - there is no per-slot locking.
pub type SharedWindow = Arc<RwLock<Window>>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn to_raw(&self) -> usize {
        self.0
    }
}

impl Display for SlotIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// Everything needed to put an expired record back on the wire after the window lock was
///  released. `frame` shares the record's buffer, the payload is not copied again.
#[derive(Clone, Debug)]
pub struct ResendJob {
    pub slot: SlotIndex,
    pub correlation_id: CorrelationId,
    pub destination: SocketAddr,
    pub frame: Bytes,
    pub transmissions: u32,
}

/// Point-in-time view of an occupied slot, for diagnostics
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SlotSnapshot {
    pub slot: SlotIndex,
    pub correlation_id: CorrelationId,
    pub destination: SocketAddr,
    pub payload_len: usize,
    pub remaining_millis: i64,
    pub transmissions: u32,
}

/// A capacity-bounded table of in-flight records. Slots are reused opportunistically (lowest
///  free index first), so there is no ordering between records beyond their slot position.
pub struct Window {
    slots: Vec<Option<InFlightRecord>>,
}

impl Window {
    pub fn new(capacity: usize) -> Window {
        Window {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn new_shared(capacity: usize) -> SharedWindow {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter()
            .filter(|s| s.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    /// Stores the record in the first empty slot. If there is none, the record is dropped and
    ///  [WindowError::Full] is returned - nothing is evicted.
    pub fn insert(&mut self, record: InFlightRecord) -> Result<SlotIndex, WindowError> {
        match self.slots.iter().position(|s| s.is_none()) {
            Some(idx) => {
                trace!("tracking {:?} in slot {}", record, idx);
                self.slots[idx] = Some(record);
                Ok(SlotIndex(idx))
            }
            None => {
                debug!("window full - not tracking {:?}", record);
                Err(WindowError::Full(self.capacity()))
            }
        }
    }

    /// Removes and returns the record in the first slot (lowest index) that satisfies the
    ///  predicate. Only a single record is removed even if several match.
    ///
    /// NB: The predicate runs inside the critical section and must not do I/O
    pub fn remove_matching(&mut self, predicate: impl Fn(&InFlightRecord) -> bool) -> Result<InFlightRecord, WindowError> {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|record| predicate(record)) {
                let removed = slot.take();
                trace!("removed record from slot {}", idx);
                return removed.ok_or(WindowError::NotFound);
            }
        }
        Err(WindowError::NotFound)
    }

    /// Visits every occupied slot in slot order.
    pub fn for_each_mut(&mut self, mut visitor: impl FnMut(SlotIndex, &mut InFlightRecord)) {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(record) = slot {
                visitor(SlotIndex(idx), record);
            }
        }
    }

    /// Brings every record's countdown up to date, restarts the timer of every record that
    ///  expired and returns those records' frames for resending. The records stay in the window.
    pub fn collect_expired(&mut self, now: Instant, retransmit_timeout: Duration) -> Vec<ResendJob> {
        let mut result = Vec::new();
        self.for_each_mut(|slot, record| {
            record.update_remaining(now, retransmit_timeout);
            if record.is_expired() {
                record.restart_timer(now, retransmit_timeout);
                result.push(ResendJob {
                    slot,
                    correlation_id: record.correlation_id(),
                    destination: record.destination(),
                    frame: record.frame().clone(),
                    transmissions: record.transmissions(),
                });
            }
        });
        result
    }

    /// Empties all slots, handing the records to the caller for release.
    pub fn drain(&mut self) -> Vec<InFlightRecord> {
        self.slots.iter_mut()
            .filter_map(|s| s.take())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots.iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|record| SlotSnapshot {
                slot: SlotIndex(idx),
                correlation_id: record.correlation_id(),
                destination: record.destination(),
                payload_len: record.payload().len(),
                remaining_millis: record.remaining_millis(),
                transmissions: record.transmissions(),
            }))
            .collect()
    }
}
