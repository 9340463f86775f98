//! The engine instance - owns everything the simulation thread touches
//!
//! [`AudioEngine::new`] returns the simulation-side engine together with the
//! [`AudioRenderer`] that must be moved to the audio thread. There is no
//! process-wide state: two engines in one process are fully independent.

use std::sync::Arc;

use basedrop::{Handle, Shared};

use super::exchange::{snapshot_exchange, SnapshotProducer};
use super::gc::GarbageCollector;
use super::renderer::{AudioRenderer, RenderAtomics};
use super::ring::BufferRing;
use super::scheduler::RenderScheduler;
use super::snapshot::Snapshot;
use super::source::{AudioProvider, AudioSource};
use crate::audio::{AudioError, AudioResult, StreamFormat};
use crate::config::RenderConfig;
use crate::effect::{EffectGraph, ListenerGraph};
use crate::spatial::{Room, Spatializer};
use crate::types::SourceKey;

/// A destroyed source whose key rooms have not been told about yet
struct PendingRemoval {
    key: SourceKey,
    /// First snapshot sequence that carried the key
    published: Option<u64>,
}

/// Simulation-side handle of a running mixing core
pub struct AudioEngine {
    format: StreamFormat,
    render: RenderConfig,
    producer: SnapshotProducer,
    atomics: Arc<RenderAtomics>,
    next_key: u64,
    pending_removals: Vec<PendingRemoval>,
    // Last, so it outlives every Shared dropped by the fields above
    gc: GarbageCollector,
}

impl AudioEngine {
    /// Create an engine for a negotiated stream format
    ///
    /// Spawns the GC thread and, unless `render.worker_threads` is 0, the
    /// render workers. Move the returned renderer into the device callback.
    pub fn new(format: StreamFormat, render: &RenderConfig) -> AudioResult<(Self, AudioRenderer)> {
        render.validate()?;
        if format.channels == 0 || format.buffer_frames == 0 || format.sample_rate == 0 {
            return Err(AudioError::InvalidConfig(format!(
                "degenerate stream format: {:?}",
                format
            )));
        }

        let gc = GarbageCollector::start()?;
        let (producer, consumer) = snapshot_exchange();
        let scheduler = RenderScheduler::new(render)?;
        let atomics = Arc::new(RenderAtomics::new());
        let renderer = AudioRenderer::new(format, consumer, scheduler, atomics.clone());

        log::info!(
            "Audio engine created: {}Hz, {} ch, {} frames/period, ring {} lookahead {} grace {}",
            format.sample_rate,
            format.channels,
            format.buffer_frames,
            render.ring_depth,
            render.lookahead,
            render.grace
        );

        let engine = Self {
            format,
            render: render.clone(),
            producer,
            atomics,
            next_key: 1,
            pending_removals: Vec::new(),
            gc,
        };
        Ok((engine, renderer))
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn render_config(&self) -> &RenderConfig {
        &self.render
    }

    /// Counters published by the renderer
    pub fn atomics(&self) -> Arc<RenderAtomics> {
        self.atomics.clone()
    }

    /// Handle for wrapping host data in `Shared<T>`
    pub fn gc_handle(&self) -> Handle {
        self.gc.handle()
    }

    /// Create a source with a ring sized for this engine's stream format
    pub fn create_source(&mut self, provider: impl AudioProvider + 'static) -> Shared<AudioSource> {
        let key = SourceKey(self.next_key);
        self.next_key += 1;

        let ring = BufferRing::new(
            self.render.ring_depth,
            self.format.channel_count(),
            self.format.frames(),
        );
        log::debug!("Created {} ({} slots)", key, ring.depth());
        Shared::new(&self.gc.handle(), AudioSource::new(key, ring, Box::new(provider)))
    }

    /// Forget a source and tell every room to release its emitter state
    ///
    /// The key is carried in each published snapshot until the renderer has
    /// picked one of them up, so a room may see `remove_emitter` more than
    /// once for the same key.
    pub fn destroy_source(&mut self, source: Shared<AudioSource>) {
        self.pending_removals.push(PendingRemoval {
            key: source.key(),
            published: None,
        });
    }

    /// Create a room; `source_radius` of `None` makes it unbounded
    pub fn create_room(
        &self,
        spatializer: impl Spatializer + 'static,
        source_radius: Option<f32>,
    ) -> Shared<Room> {
        let room = Room::new(spatializer);
        let room = match source_radius {
            Some(radius) => room.with_source_radius(radius),
            None => room,
        };
        Shared::new(&self.gc.handle(), room)
    }

    pub fn create_listener_graph(&self, graph: EffectGraph) -> Shared<ListenerGraph> {
        Shared::new(&self.gc.handle(), ListenerGraph::new(graph))
    }

    /// Start a new tick: clear and return the snapshot under construction
    pub fn begin_snapshot(&mut self) -> &mut Snapshot {
        self.producer.begin_snapshot()
    }

    /// The snapshot under construction
    pub fn snapshot(&mut self) -> &mut Snapshot {
        self.producer.current_mut()
    }

    /// Publish the snapshot under construction; returns its sequence number
    pub fn publish_snapshot(&mut self) -> u64 {
        let consumed = self.atomics.snapshot_sequence();
        self.pending_removals
            .retain(|pending| pending.published.map_or(true, |seq| seq > consumed));

        let sequence = self.producer.next_sequence();
        let snapshot = self.producer.current_mut();
        for pending in &mut self.pending_removals {
            if !snapshot.destroyed.contains(&pending.key) {
                snapshot.destroyed.push(pending.key);
            }
            pending.published.get_or_insert(sequence);
        }

        self.producer.publish()
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("format", &self.format)
            .field("render", &self.render)
            .field("next_key", &self.next_key)
            .field("pending_removals", &self.pending_removals.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ConstantProvider;

    fn format() -> StreamFormat {
        StreamFormat::new(48000, 2, 64)
    }

    #[test]
    fn test_rejects_invalid_render_config() {
        let config = RenderConfig {
            ring_depth: 2,
            lookahead: 2,
            ..RenderConfig::inline()
        };
        assert!(matches!(
            AudioEngine::new(format(), &config),
            Err(AudioError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_degenerate_format() {
        let format = StreamFormat::new(48000, 0, 64);
        assert!(AudioEngine::new(format, &RenderConfig::inline()).is_err());
    }

    #[test]
    fn test_source_keys_are_unique() {
        let (mut engine, _renderer) = AudioEngine::new(format(), &RenderConfig::inline()).unwrap();
        let a = engine.create_source(ConstantProvider::new(0.1));
        let b = engine.create_source(ConstantProvider::new(0.1));
        assert_ne!(a.key(), b.key());
        assert_eq!(a.ring().depth(), 3);
    }

    #[test]
    fn test_destroyed_key_repeats_until_consumed() {
        let (mut engine, mut renderer) =
            AudioEngine::new(format(), &RenderConfig::inline()).unwrap();
        let source = engine.create_source(ConstantProvider::new(0.1));
        let key = source.key();
        engine.destroy_source(source);
        assert_eq!(engine.pending_removals.len(), 1);
        assert_eq!(engine.pending_removals[0].key, key);

        engine.begin_snapshot();
        assert_eq!(engine.publish_snapshot(), 1);
        assert_eq!(engine.pending_removals[0].published, Some(1));

        // Not consumed yet: the next publication carries the key again
        engine.begin_snapshot();
        engine.publish_snapshot();
        assert_eq!(engine.pending_removals.len(), 1);

        let mut out = vec![0.0; format().period_samples()];
        renderer.tick(&mut out);
        assert_eq!(engine.atomics().snapshot_sequence(), 2);

        engine.begin_snapshot();
        engine.publish_snapshot();
        assert!(engine.pending_removals.is_empty());

        renderer.tick(&mut out);
        assert_eq!(engine.atomics().snapshot_sequence(), 3);
        assert_eq!(renderer.processing_id(), 2);
    }
}
