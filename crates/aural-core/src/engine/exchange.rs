//! Lock-free triple-buffered snapshot handoff
//!
//! Three [`Snapshot`]s are allocated once. At any instant each one is owned by
//! exactly one role:
//!
//! - **current**: written by the simulation thread ([`SnapshotProducer`])
//! - **back**: the most recently published snapshot, owned by nobody
//! - **render**: read by the audio thread ([`SnapshotConsumer`])
//!
//! The back index lives in a single `AtomicU8` together with a `FRESH` bit.
//! Publishing swaps current with back and sets `FRESH`; the audio thread swaps
//! render with back only when `FRESH` is set. Both swaps are a single atomic
//! exchange, so neither side ever waits on the other, and a published snapshot
//! is never mutated again until the consumer has handed it back.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::snapshot::Snapshot;

const INDEX_MASK: u8 = 0b011;
const FRESH: u8 = 0b100;

struct Exchange {
    slots: [UnsafeCell<Snapshot>; 3],
    back: AtomicU8,
}

// SAFETY: each slot index is held by exactly one of producer, back or
// consumer. Ownership moves only through `back.swap` (AcqRel), which orders
// the previous owner's writes before the next owner's reads.
unsafe impl Sync for Exchange {}

/// Create a connected producer/consumer pair
///
/// The producer is owned by the simulation thread, the consumer by the audio
/// thread. The consumer starts out rendering an empty snapshot.
pub fn snapshot_exchange() -> (SnapshotProducer, SnapshotConsumer) {
    let exchange = Arc::new(Exchange {
        slots: std::array::from_fn(|_| UnsafeCell::new(Snapshot::default())),
        back: AtomicU8::new(1),
    });
    let producer = SnapshotProducer {
        exchange: exchange.clone(),
        current: 0,
        next_sequence: 1,
    };
    let consumer = SnapshotConsumer {
        exchange,
        render: 2,
    };
    (producer, consumer)
}

/// Simulation-side handle
pub struct SnapshotProducer {
    exchange: Arc<Exchange>,
    current: u8,
    next_sequence: u64,
}

impl SnapshotProducer {
    /// Clear the snapshot under construction and return it for filling
    pub fn begin_snapshot(&mut self) -> &mut Snapshot {
        let snapshot = self.current_mut();
        snapshot.clear();
        snapshot
    }

    /// The snapshot under construction, as left by the last call
    ///
    /// After a publish this is a recycled snapshot whose contents are stale;
    /// prefer [`begin_snapshot`](Self::begin_snapshot) to start a new tick.
    pub fn current_mut(&mut self) -> &mut Snapshot {
        // SAFETY: `current` is owned exclusively by this producer.
        unsafe { &mut *self.exchange.slots[self.current as usize].get() }
    }

    /// Hand the snapshot under construction to the audio thread
    ///
    /// Returns the sequence number stamped on it. If the audio thread has not
    /// picked up the previous publication yet, that one is superseded and
    /// recycled as the next snapshot under construction.
    pub fn publish(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.current_mut().sequence = sequence;

        let previous = self
            .exchange
            .back
            .swap(self.current | FRESH, Ordering::AcqRel);
        self.current = previous & INDEX_MASK;
        sequence
    }

    /// Sequence number the next publish will carry
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

/// Audio-side handle
pub struct SnapshotConsumer {
    exchange: Arc<Exchange>,
    render: u8,
}

impl SnapshotConsumer {
    /// Pick up the latest published snapshot, if there is a new one
    ///
    /// Wait-free. Returns `true` if the render snapshot changed; otherwise the
    /// previous one stays in use.
    pub fn swap(&mut self) -> bool {
        if self.exchange.back.load(Ordering::Relaxed) & FRESH == 0 {
            return false;
        }
        let previous = self.exchange.back.swap(self.render, Ordering::AcqRel);
        self.render = previous & INDEX_MASK;
        true
    }

    /// The snapshot the audio thread is currently rendering
    pub fn render(&self) -> &Snapshot {
        // SAFETY: `render` is owned exclusively by this consumer.
        unsafe { &*self.exchange.slots[self.render as usize].get() }
    }
}
