//! Per-callback mixing
//!
//! Accumulates every source whose ring slot is fresh for the current
//! processing ID into one interleaved output period:
//!
//! 1. Rooms: the listener pose and every fresh point source inside the room
//!    are handed to the room's spatializer, which simulates into the shared
//!    planar buffer; the result is blended into the accumulator.
//! 2. Ambients: each fresh ambient source is scaled by its volume into the
//!    shared buffer and blended, without spatialization.
//! 3. Listener graph: rendered into the cleared shared buffer and blended.
//!
//! The processing ID then advances by exactly one and the accumulator is
//! hard-clipped to [-1, 1]. All buffers are allocated once at construction.

use super::snapshot::Snapshot;
use crate::audio::StreamFormat;
use crate::types::{blend_into_interleaved, hard_clip, PlanarBuffer, ProcessingId, Sample};

pub struct Mixer {
    /// Interleaved output period
    accum: Vec<Sample>,
    /// Planar buffer rooms, ambients and the listener graph render into
    shared: PlanarBuffer,
    /// Working storage for spatializers and effects
    scratch: PlanarBuffer,
    processing_id: ProcessingId,
    rendered_frames: u64,
}

impl Mixer {
    pub fn new(format: StreamFormat) -> Self {
        let channels = format.channel_count();
        let frames = format.frames();
        Self {
            accum: vec![0.0; format.period_samples()],
            shared: PlanarBuffer::new(channels, frames),
            scratch: PlanarBuffer::new(channels, frames),
            processing_id: 0,
            rendered_frames: 0,
        }
    }

    /// Processing ID of the next tick to be mixed
    #[inline]
    pub fn processing_id(&self) -> ProcessingId {
        self.processing_id
    }

    /// Frames produced since the mixer was created
    #[inline]
    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames
    }

    /// The last mixed period (interleaved, clipped)
    #[inline]
    pub fn output(&self) -> &[Sample] {
        &self.accum
    }

    /// Mix one tick for the current processing ID
    ///
    /// `fresh_snapshot` is true on the first tick that renders `snapshot`;
    /// destroyed-source notifications are only delivered then.
    pub fn mix(&mut self, snapshot: &Snapshot, fresh_snapshot: bool) -> &[Sample] {
        let id = self.processing_id;

        self.accum.fill(0.0);
        self.shared.fill_silence();
        self.scratch.fill_silence();

        if fresh_snapshot && !snapshot.destroyed.is_empty() {
            self.release_destroyed(snapshot);
        }

        self.mix_rooms(snapshot, id);
        self.mix_ambients(snapshot, id);
        self.mix_listener_graph(snapshot);

        self.processing_id += 1;
        self.rendered_frames += self.shared.frames() as u64;
        hard_clip(&mut self.accum);
        &self.accum
    }

    fn release_destroyed(&mut self, snapshot: &Snapshot) {
        for instance in &snapshot.rooms {
            // A room being configured right now misses the notification
            if let Some(mut spatializer) = instance.room.try_spatializer() {
                for key in &snapshot.destroyed {
                    spatializer.remove_emitter(*key);
                }
            }
        }
    }

    fn mix_rooms(&mut self, snapshot: &Snapshot, id: ProcessingId) {
        for instance in &snapshot.rooms {
            let room = &*instance.room;
            if !room.contains(&instance.pose, snapshot.listener.position) {
                continue;
            }
            let Some(mut spatializer) = room.try_spatializer() else {
                continue;
            };

            spatializer.set_listener_transform(snapshot.listener);
            self.shared.fill_silence();

            for point in &snapshot.sources {
                if !room.contains(&instance.pose, point.pose.position) {
                    continue;
                }
                if let Some(samples) = point.source.ring().fresh(id) {
                    spatializer.add_emitter(
                        samples,
                        point.pose,
                        instance.pose,
                        point.source.key(),
                        point.volume,
                    );
                }
            }

            spatializer.simulate(&mut self.shared, &mut self.scratch);
            blend_into_interleaved(&mut self.accum, &self.shared);
        }
    }

    fn mix_ambients(&mut self, snapshot: &Snapshot, id: ProcessingId) {
        for ambient in &snapshot.ambients {
            if let Some(samples) = ambient.source.ring().fresh(id) {
                self.shared.fill_silence();
                self.shared.add_scaled_from(samples, ambient.volume);
                blend_into_interleaved(&mut self.accum, &self.shared);
            }
        }
    }

    fn mix_listener_graph(&mut self, snapshot: &Snapshot) {
        let Some(listener_graph) = &snapshot.listener_graph else {
            return;
        };
        if let Some(mut graph) = listener_graph.try_lock() {
            self.shared.fill_silence();
            graph.process(&mut self.shared, &mut self.scratch);
            blend_into_interleaved(&mut self.accum, &self.shared);
        }
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("processing_id", &self.processing_id)
            .field("rendered_frames", &self.rendered_frames)
            .field("period_samples", &self.accum.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ring::BufferRing;
    use crate::engine::source::{AudioSource, ConstantProvider};
    use crate::engine::GarbageCollector;
    use crate::types::SourceKey;
    use basedrop::Shared;

    fn rendered_source(
        gc: &GarbageCollector,
        format: StreamFormat,
        value: f32,
        id: ProcessingId,
    ) -> Shared<AudioSource> {
        let ring = BufferRing::new(3, format.channel_count(), format.frames());
        let source = AudioSource::new(SourceKey(1), ring, Box::new(ConstantProvider::new(value)));
        assert!(source.ring().slot_for(id).try_claim(id));
        source.render(id);
        Shared::new(&gc.handle(), source)
    }

    #[test]
    fn test_processing_id_advances_on_empty_snapshot() {
        let mut mixer = Mixer::new(StreamFormat::new(48000, 2, 64));
        let snapshot = Snapshot::default();
        for n in 0..10 {
            assert_eq!(mixer.processing_id(), n);
            let out = mixer.mix(&snapshot, n == 0);
            assert!(out.iter().all(|&s| s == 0.0));
        }
        assert_eq!(mixer.rendered_frames(), 640);
    }

    #[test]
    fn test_ambient_volume_and_freshness() {
        let gc = GarbageCollector::start().unwrap();
        let format = StreamFormat::new(48000, 2, 16);
        let source = rendered_source(&gc, format, 0.5, 0);

        let mut snapshot = Snapshot::default();
        snapshot.add_ambient(&source, 0.5);

        let mut mixer = Mixer::new(format);
        let out = mixer.mix(&snapshot, true);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));

        // Slot was completed for ID 0 only
        let out = mixer.mix(&snapshot, false);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
