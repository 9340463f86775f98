//! Per-source ring of pre-allocated render buffers
//!
//! Each source owns `N` identical slots. A render task targeting processing ID
//! `t` writes into `slot[t % N]` and then release-stores `t` into the slot's
//! completion stamp. The mixer acquire-loads the stamp of the slot for the
//! *current* ID and trusts the buffer only if the stamp equals that ID exactly.
//! There is no lock between writer and reader: the stamp is the handshake.
//!
//! # Slot state machine
//!
//! ```text
//!            try_claim (audio)              render done (worker)
//!   Idle ─────────────────────► Queued ───────────────► Committing ──► Complete
//!   Complete ──────────────────►   │                                       │
//!     ▲                            │ cancel (audio)                        │
//!     │                            ▼                                       │
//!     └──── worker exits ──── Cancelled                    try_claim ◄─────┘
//! ```
//!
//! Only the audio thread moves a slot into `Queued` or `Cancelled`; only the
//! worker running the slot's task moves it out. A slot in `Queued`,
//! `Committing` or `Cancelled` has a live writer and is never re-claimed.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::types::{PlanarBuffer, ProcessingId};

/// Completion stamp of a slot that has never been written
pub const NEVER_COMPLETED: ProcessingId = ProcessingId::MAX;

const IDLE: u8 = 0;
const QUEUED: u8 = 1;
const COMMITTING: u8 = 2;
const COMPLETE: u8 = 3;
const CANCELLED: u8 = 4;

/// Observable state of a buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No writer, nothing published since the last cancellation (or ever)
    Idle,
    /// A render task has been submitted and has not finished
    Queued,
    /// The task finished and is publishing its completion stamp
    Committing,
    /// The last task published its samples
    Complete,
    /// Cancellation was requested; the worker may still be running
    Cancelled,
}

impl SlotState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            QUEUED => SlotState::Queued,
            COMMITTING => SlotState::Committing,
            COMPLETE => SlotState::Complete,
            CANCELLED => SlotState::Cancelled,
            _ => SlotState::Idle,
        }
    }
}

/// How a render task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Samples were published under the task's target ID
    Completed,
    /// The task was cancelled and published nothing
    Cancelled,
}

/// Cooperative cancellation flag handed to providers
///
/// Providers doing long-running work should poll [`CancelToken::is_cancelled`]
/// and return promptly once it is set. Whatever they write afterwards is
/// never published.
#[derive(Clone, Copy)]
pub struct CancelToken<'a> {
    state: &'a AtomicU8,
}

impl CancelToken<'_> {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Relaxed) == CANCELLED
    }
}

impl std::fmt::Debug for CancelToken<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Sample storage of one slot
#[derive(Debug)]
pub struct SlotBuffers {
    /// Planar output for one buffer period
    pub output: PlanarBuffer,
    /// Working storage for the provider's DSP
    pub scratch: PlanarBuffer,
}

/// One entry of a source's buffer ring
pub struct BufferSlot {
    buffers: UnsafeCell<SlotBuffers>,
    completion: AtomicU64,
    target: AtomicU64,
    state: AtomicU8,
}

// SAFETY: `buffers` is written only by the worker that holds the slot in
// `Queued`/`Cancelled`, and read by the mixer only after an acquire-load of a
// completion stamp equal to the current processing ID. The scheduler never
// claims a slot with a live writer, and ring depth validation guarantees a
// slot is not re-claimed before the tick that reads it has finished mixing.
unsafe impl Sync for BufferSlot {}

impl BufferSlot {
    fn new(channels: usize, frames: usize) -> Self {
        Self {
            buffers: UnsafeCell::new(SlotBuffers {
                output: PlanarBuffer::new(channels, frames),
                scratch: PlanarBuffer::new(channels, frames),
            }),
            completion: AtomicU64::new(NEVER_COMPLETED),
            target: AtomicU64::new(NEVER_COMPLETED),
            state: AtomicU8::new(IDLE),
        }
    }

    /// Processing ID of the last published render (acquire)
    #[inline]
    pub fn completion_id(&self) -> ProcessingId {
        self.completion.load(Ordering::Acquire)
    }

    /// Target of the most recently claimed task
    #[inline]
    pub fn target_id(&self) -> ProcessingId {
        self.target.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        SlotState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Reserve this slot for a task targeting `target` (audio thread only)
    ///
    /// Fails if a previous writer is still live.
    pub(crate) fn try_claim(&self, target: ProcessingId) -> bool {
        let current = self.state.load(Ordering::Acquire);
        if current != IDLE && current != COMPLETE {
            return false;
        }
        if self
            .state
            .compare_exchange(current, QUEUED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.target.store(target, Ordering::Relaxed);
        true
    }

    /// Give back a claim whose task was never submitted
    pub(crate) fn release_claim(&self) {
        let _ = self
            .state
            .compare_exchange(QUEUED, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Request cancellation of an unfinished task (audio thread only)
    ///
    /// Returns `true` if the task had not finished and is now cancelled,
    /// which is what the scheduler counts as a drop.
    pub(crate) fn cancel(&self) -> bool {
        self.state
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Run a render task against this slot (worker thread)
    ///
    /// `render` receives the slot's buffers and a cancellation token. If the
    /// task is still live when `render` returns, the completion stamp is
    /// release-stored as `target`.
    pub(crate) fn render<F>(&self, target: ProcessingId, render: F) -> RenderOutcome
    where
        F: FnOnce(&mut SlotBuffers, CancelToken<'_>),
    {
        let token = CancelToken { state: &self.state };
        if !token.is_cancelled() {
            // SAFETY: the slot is `Queued` or `Cancelled`, so this worker is
            // its only writer and the mixer is not reading it (see the Sync impl).
            let buffers = unsafe { &mut *self.buffers.get() };
            render(buffers, token);
        }

        match self
            .state
            .compare_exchange(QUEUED, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.completion.store(target, Ordering::Release);
                self.state.store(COMPLETE, Ordering::Release);
                RenderOutcome::Completed
            }
            Err(_) => {
                self.state.store(IDLE, Ordering::Release);
                RenderOutcome::Cancelled
            }
        }
    }

    /// The published output if it was completed for exactly `id`
    #[inline]
    fn fresh_output(&self, id: ProcessingId) -> Option<&PlanarBuffer> {
        if self.completion_id() != id {
            return None;
        }
        // SAFETY: the acquire-load above synchronized with the writer's
        // release-store of `id`; no writer for a later ID can have claimed
        // this slot until the tick for `id` has been mixed.
        Some(unsafe { &(*self.buffers.get()).output })
    }
}

impl std::fmt::Debug for BufferSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSlot")
            .field("state", &self.state())
            .field("completion", &self.completion_id())
            .field("target", &self.target_id())
            .finish()
    }
}

/// Ring of `N` slots for one source
///
/// Allocated once when the source is created, sized for the device's buffer
/// length and channel count, and never reallocated afterwards.
#[derive(Debug)]
pub struct BufferRing {
    slots: Box<[BufferSlot]>,
}

impl BufferRing {
    pub fn new(depth: usize, channels: usize, frames: usize) -> Self {
        debug_assert!(depth >= 2, "ring depth must be at least 2");
        let slots = (0..depth)
            .map(|_| BufferSlot::new(channels, frames))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    /// Ring depth `N`
    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// The slot used for processing ID `id`
    #[inline]
    pub fn slot_for(&self, id: ProcessingId) -> &BufferSlot {
        &self.slots[(id % self.slots.len() as u64) as usize]
    }

    /// Samples rendered for exactly `id`, or `None` (no contribution this tick)
    #[inline]
    pub fn fresh(&self, id: ProcessingId) -> Option<&PlanarBuffer> {
        self.slot_for(id).fresh_output(id)
    }

    pub fn slots(&self) -> impl Iterator<Item = &BufferSlot> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_slot_is_never_fresh() {
        let ring = BufferRing::new(3, 2, 8);
        for id in 0..10 {
            assert!(ring.fresh(id).is_none());
        }
        assert_eq!(ring.slot_for(0).completion_id(), NEVER_COMPLETED);
    }

    #[test]
    fn test_completed_render_is_fresh_only_for_its_id() {
        let ring = BufferRing::new(3, 1, 4);
        let slot = ring.slot_for(4);
        assert!(slot.try_claim(4));

        let outcome = slot.render(4, |buffers, _| buffers.output.fill(0.25));
        assert_eq!(outcome, RenderOutcome::Completed);
        assert_eq!(slot.state(), SlotState::Complete);

        assert_eq!(ring.fresh(4).map(|b| b.as_slice()), Some(&[0.25; 4][..]));
        // Same slot index, different epoch
        assert!(ring.fresh(1).is_none());
        assert!(ring.fresh(7).is_none());
    }

    #[test]
    fn test_live_slot_cannot_be_claimed() {
        let ring = BufferRing::new(2, 1, 4);
        let slot = ring.slot_for(0);
        assert!(slot.try_claim(0));
        assert!(!slot.try_claim(2));

        assert!(slot.cancel());
        assert_eq!(slot.state(), SlotState::Cancelled);
        assert!(!slot.try_claim(2), "cancelled slot still has a live writer");
    }

    #[test]
    fn test_cancel_before_start_publishes_nothing() {
        let ring = BufferRing::new(2, 1, 4);
        let slot = ring.slot_for(6);
        assert!(slot.try_claim(6));
        assert!(slot.cancel());

        let mut ran = false;
        let outcome = slot.render(6, |_, _| ran = true);
        assert!(!ran);
        assert_eq!(outcome, RenderOutcome::Cancelled);
        assert_eq!(slot.state(), SlotState::Idle);
        assert!(ring.fresh(6).is_none());
        assert!(slot.try_claim(8));
    }

    #[test]
    fn test_cancel_during_render_discards_partial_write() {
        let ring = BufferRing::new(2, 1, 4);
        let slot = ring.slot_for(3);
        assert!(slot.try_claim(3));

        let outcome = slot.render(3, |buffers, token| {
            buffers.output.fill(0.5);
            assert!(slot.cancel());
            assert!(token.is_cancelled());
        });

        assert_eq!(outcome, RenderOutcome::Cancelled);
        assert!(ring.fresh(3).is_none());
    }

    #[test]
    fn test_cancel_after_completion_is_not_a_drop() {
        let ring = BufferRing::new(2, 1, 4);
        let slot = ring.slot_for(1);
        assert!(slot.try_claim(1));
        slot.render(1, |buffers, _| buffers.output.fill(1.0));
        assert!(!slot.cancel());
        assert!(ring.fresh(1).is_some());
    }

    #[test]
    fn test_release_claim_returns_slot_to_idle() {
        let ring = BufferRing::new(2, 1, 4);
        let slot = ring.slot_for(0);
        assert!(slot.try_claim(0));
        slot.release_claim();
        assert_eq!(slot.state(), SlotState::Idle);
        assert!(slot.try_claim(0));
    }
}
