//! Per-tick audio world state
//!
//! The simulation thread fills one [`Snapshot`] per tick and publishes it
//! through the snapshot exchange. Once published the snapshot is read-only;
//! the object graph it references (sources, rooms, effect graphs) is held by
//! `basedrop::Shared` so the audio thread can drop the last reference
//! without freeing memory.

use basedrop::Shared;

use super::source::AudioSource;
use crate::effect::ListenerGraph;
use crate::spatial::Room;
use crate::types::{Pose, SourceKey};

/// A room placed in the world
#[derive(Clone)]
pub struct RoomInstance {
    pub room: Shared<Room>,
    pub pose: Pose,
}

/// A positional source, spatialized by every room that contains it
#[derive(Clone)]
pub struct PointSource {
    pub source: Shared<AudioSource>,
    pub pose: Pose,
    pub volume: f32,
}

/// A non-positional source mixed without room spatialization
#[derive(Clone)]
pub struct AmbientSource {
    pub source: Shared<AudioSource>,
    pub volume: f32,
}

/// Everything the audio thread needs for one tick
#[derive(Default)]
pub struct Snapshot {
    /// Publication sequence, stamped by the producer on publish
    pub sequence: u64,
    pub listener: Pose,
    pub rooms: Vec<RoomInstance>,
    pub sources: Vec<PointSource>,
    pub ambients: Vec<AmbientSource>,
    pub listener_graph: Option<Shared<ListenerGraph>>,
    /// Keys of sources destroyed since the previous published snapshot
    pub destroyed: Vec<SourceKey>,
}

impl Snapshot {
    /// Reset to an empty world, keeping every vector's capacity
    pub fn clear(&mut self) {
        self.listener = Pose::IDENTITY;
        self.rooms.clear();
        self.sources.clear();
        self.ambients.clear();
        self.listener_graph = None;
        self.destroyed.clear();
    }

    pub fn set_listener(&mut self, pose: Pose) {
        self.listener = pose;
    }

    pub fn add_room(&mut self, room: &Shared<Room>, pose: Pose) {
        self.rooms.push(RoomInstance {
            room: room.clone(),
            pose,
        });
    }

    pub fn add_point_source(&mut self, source: &Shared<AudioSource>, pose: Pose, volume: f32) {
        self.sources.push(PointSource {
            source: source.clone(),
            pose,
            volume,
        });
    }

    pub fn add_ambient(&mut self, source: &Shared<AudioSource>, volume: f32) {
        self.ambients.push(AmbientSource {
            source: source.clone(),
            volume,
        });
    }

    pub fn set_listener_graph(&mut self, graph: Option<&Shared<ListenerGraph>>) {
        self.listener_graph = graph.cloned();
    }

    /// Record that `key` was destroyed so rooms release its emitter state
    pub fn mark_destroyed(&mut self, key: SourceKey) {
        self.destroyed.push(key);
    }

    /// Number of distinct render tasks this snapshot can produce per tick
    pub fn source_count(&self) -> usize {
        self.sources.len() + self.ambients.len()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("sequence", &self.sequence)
            .field("listener", &self.listener)
            .field("rooms", &self.rooms.len())
            .field("sources", &self.sources.len())
            .field("ambients", &self.ambients.len())
            .field("listener_graph", &self.listener_graph.is_some())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
