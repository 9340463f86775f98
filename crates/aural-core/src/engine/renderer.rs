//! Device callback glue
//!
//! [`AudioRenderer`] is the only object the audio thread touches. One tick:
//!
//! 1. pick up the latest published snapshot (wait-free)
//! 2. cancel overdue render tasks, schedule the next ones
//! 3. mix the current processing ID into the output period
//! 4. publish counters to [`RenderAtomics`]
//!
//! The drop hook is called exactly once per device callback (`tick`,
//! `tick_bytes` or `render_stream`) with the drops of every tick it ran.
//!
//! Nothing here blocks, allocates or returns an error. Output that cannot be
//! produced is silence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::drops::{DropHook, LogDropHook};
use super::exchange::SnapshotConsumer;
use super::mixer::Mixer;
use super::scheduler::RenderScheduler;
use crate::audio::StreamFormat;
use crate::types::{ProcessingId, Sample};

/// Lock-free counters readable from any thread
#[derive(Debug, Default)]
pub struct RenderAtomics {
    /// Processing ID of the next tick (= ticks completed)
    pub processing_id: AtomicU64,
    /// Render tasks cancelled past their deadline, since start
    pub dropped: AtomicU64,
    /// Frames handed to the device, since start
    pub rendered_frames: AtomicU64,
    /// Sequence of the snapshot used by the last tick (0 = none yet)
    pub snapshot_sequence: AtomicU64,
}

impl RenderAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn processing_id(&self) -> ProcessingId {
        self.processing_id.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn snapshot_sequence(&self) -> u64 {
        self.snapshot_sequence.load(Ordering::Relaxed)
    }
}

/// Audio-thread half of an engine
pub struct AudioRenderer {
    format: StreamFormat,
    consumer: SnapshotConsumer,
    scheduler: RenderScheduler,
    mixer: Mixer,
    drop_hook: Box<dyn DropHook>,
    atomics: Arc<RenderAtomics>,
    /// Samples of the last mixed period already handed out by `render_stream`
    staged: usize,
}

impl AudioRenderer {
    pub(crate) fn new(
        format: StreamFormat,
        consumer: SnapshotConsumer,
        scheduler: RenderScheduler,
        atomics: Arc<RenderAtomics>,
    ) -> Self {
        Self {
            format,
            consumer,
            scheduler,
            mixer: Mixer::new(format),
            drop_hook: Box::new(LogDropHook),
            atomics,
            staged: format.period_samples(),
        }
    }

    /// Replace the drop hook (default: [`LogDropHook`])
    pub fn set_drop_hook(&mut self, hook: impl DropHook + 'static) {
        self.drop_hook = Box::new(hook);
    }

    pub fn with_drop_hook(mut self, hook: impl DropHook + 'static) -> Self {
        self.set_drop_hook(hook);
        self
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn atomics(&self) -> Arc<RenderAtomics> {
        self.atomics.clone()
    }

    /// Processing ID of the next tick
    pub fn processing_id(&self) -> ProcessingId {
        self.mixer.processing_id()
    }

    /// Render tasks submitted and not yet retired
    pub fn outstanding_renders(&self) -> usize {
        self.scheduler.outstanding()
    }

    /// Run one tick into `output`
    ///
    /// `output` should hold exactly one period of interleaved samples. A
    /// shorter buffer receives the head of the period, a longer one is padded
    /// with silence.
    pub fn tick(&mut self, output: &mut [Sample]) {
        let drops = self.run_tick();
        self.drop_hook.on_drop_audio_worklets(drops);

        let mixed = self.mixer.output();
        let n = mixed.len().min(output.len());
        output[..n].copy_from_slice(&mixed[..n]);
        output[n..].fill(0.0);
        self.staged = mixed.len();
    }

    /// Run one tick into a raw byte buffer of native-endian `f32`
    ///
    /// A buffer that is misaligned or not a whole number of samples is
    /// filled with zeros and no tick is run.
    pub fn tick_bytes(&mut self, output: &mut [u8]) {
        match bytemuck::try_cast_slice_mut::<u8, f32>(output) {
            Ok(samples) => self.tick(samples),
            Err(_) => {
                output.fill(0);
                self.drop_hook.on_drop_audio_worklets(0);
            }
        }
    }

    /// Fill a device buffer of any length
    ///
    /// Runs as many whole ticks as needed, carrying the unused tail of the
    /// last period over to the next call. The drop hook sees the drops of
    /// all those ticks as one report.
    pub fn render_stream(&mut self, output: &mut [Sample]) {
        let period = self.format.period_samples();
        if period == 0 {
            output.fill(0.0);
            self.drop_hook.on_drop_audio_worklets(0);
            return;
        }

        let mut drops = 0u32;
        let mut written = 0;
        while written < output.len() {
            if self.staged >= period {
                drops = drops.saturating_add(self.run_tick());
                self.staged = 0;
            }
            let available = &self.mixer.output()[self.staged..];
            let n = available.len().min(output.len() - written);
            output[written..written + n].copy_from_slice(&available[..n]);
            written += n;
            self.staged += n;
        }
        self.drop_hook.on_drop_audio_worklets(drops);
    }

    /// One tick into the mixer's period; returns the drop count
    fn run_tick(&mut self) -> u32 {
        let fresh = self.consumer.swap();
        let snapshot = self.consumer.render();
        let current = self.mixer.processing_id();

        let drops = self.scheduler.run(snapshot, current);
        self.mixer.mix(snapshot, fresh);

        let atomics = &self.atomics;
        atomics
            .processing_id
            .store(self.mixer.processing_id(), Ordering::Relaxed);
        atomics
            .rendered_frames
            .store(self.mixer.rendered_frames(), Ordering::Relaxed);
        atomics
            .snapshot_sequence
            .store(snapshot.sequence, Ordering::Relaxed);
        if drops > 0 {
            atomics.dropped.fetch_add(drops as u64, Ordering::Relaxed);
        }
        drops
    }
}

impl std::fmt::Debug for AudioRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRenderer")
            .field("format", &self.format)
            .field("mixer", &self.mixer)
            .field("outstanding", &self.scheduler.outstanding())
            .finish()
    }
}
