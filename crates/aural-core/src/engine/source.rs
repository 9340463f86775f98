//! Audio sources and the provider contract
//!
//! An [`AudioSource`] pairs a [`BufferRing`] with the external DSP/codec
//! collaborator that fills it. Sources are created by the engine (which sizes
//! the ring for the negotiated stream format) and referenced from snapshots
//! through `basedrop::Shared`, so the audio thread never frees one.

use std::sync::atomic::{AtomicU64, Ordering};

use super::ring::{BufferRing, CancelToken, RenderOutcome, NEVER_COMPLETED};
use crate::types::{PlanarBuffer, ProcessingId, SourceKey};

/// Per-source render contract
///
/// `provide` must fully populate `output` with exactly one buffer period of
/// samples for processing ID `target`. It runs on a worker thread, may take
/// up to the scheduler's lookahead + grace before it is cancelled, and must
/// not write to `output` after `cancel` reports cancellation.
///
/// Several calls for consecutive targets can run concurrently when a render
/// takes longer than one period, hence `&self`.
pub trait AudioProvider: Send + Sync {
    fn provide(
        &self,
        target: ProcessingId,
        output: &mut PlanarBuffer,
        scratch: &mut PlanarBuffer,
        cancel: CancelToken<'_>,
    );
}

/// A renderable source: stable key, buffer ring and provider
pub struct AudioSource {
    key: SourceKey,
    ring: BufferRing,
    provider: Box<dyn AudioProvider>,
    /// Last target this source was scheduled for; the per-cycle de-dup marker
    scheduled_for: AtomicU64,
}

impl AudioSource {
    pub(crate) fn new(key: SourceKey, ring: BufferRing, provider: Box<dyn AudioProvider>) -> Self {
        Self {
            key,
            ring,
            provider,
            scheduled_for: AtomicU64::new(NEVER_COMPLETED),
        }
    }

    #[inline]
    pub fn key(&self) -> SourceKey {
        self.key
    }

    #[inline]
    pub fn ring(&self) -> &BufferRing {
        &self.ring
    }

    /// Record that a task for `target` is being scheduled (audio thread only)
    ///
    /// Returns `false` if this source was already scheduled for `target`,
    /// which happens when a snapshot lists the same source more than once.
    #[inline]
    pub(crate) fn mark_scheduled(&self, target: ProcessingId) -> bool {
        self.scheduled_for.swap(target, Ordering::Relaxed) != target
    }

    /// Run the provider for `target` into its ring slot (worker thread)
    pub(crate) fn render(&self, target: ProcessingId) -> RenderOutcome {
        let provider = &self.provider;
        self.ring.slot_for(target).render(target, |buffers, cancel| {
            provider.provide(target, &mut buffers.output, &mut buffers.scratch, cancel);
        })
    }
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSource")
            .field("key", &self.key)
            .field("ring_depth", &self.ring.depth())
            .finish()
    }
}

/// Provider that writes a constant value on every channel
///
/// Useful as a calibration signal: mixed as an ambient source at volume 1.0
/// it reproduces `value` exactly on every output sample.
#[derive(Debug, Clone, Copy)]
pub struct ConstantProvider {
    pub value: f32,
}

impl ConstantProvider {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl AudioProvider for ConstantProvider {
    fn provide(
        &self,
        _target: ProcessingId,
        output: &mut PlanarBuffer,
        _scratch: &mut PlanarBuffer,
        _cancel: CancelToken<'_>,
    ) {
        output.fill(self.value);
    }
}

/// Stateless sine oscillator
///
/// Phase is derived from the target ID, so concurrent renders of consecutive
/// periods produce a continuous waveform without shared state.
#[derive(Debug, Clone, Copy)]
pub struct SineProvider {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
}

impl SineProvider {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate: sample_rate.max(1),
        }
    }
}

impl AudioProvider for SineProvider {
    fn provide(
        &self,
        target: ProcessingId,
        output: &mut PlanarBuffer,
        _scratch: &mut PlanarBuffer,
        _cancel: CancelToken<'_>,
    ) {
        let frames = output.frames() as u64;
        let first_frame = target.wrapping_mul(frames);
        let step = self.frequency as f64 / self.sample_rate as f64;

        for ch in 0..output.channels() {
            for (i, s) in output.channel_mut(ch).iter_mut().enumerate() {
                let phase = ((first_frame + i as u64) as f64 * step).fract();
                *s = self.amplitude * (phase * std::f64::consts::TAU).sin() as f32;
            }
        }
    }
}
