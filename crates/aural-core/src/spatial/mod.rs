//! Rooms and the spatializer collaborator
//!
//! A [`Room`] is a spatial audio zone. The mixing core only sequences calls
//! into its [`Spatializer`] once per room per tick:
//!
//! 1. `set_listener_transform` with the snapshot's listener pose
//! 2. `add_emitter` for every fresh point source inside the room
//! 3. `simulate` into the mixer's shared planar buffer
//!
//! What the spatializer computes (HRTF, occlusion, reverb) is its own business.

mod distance;

pub use distance::DistanceSpatializer;

use std::sync::{Mutex, MutexGuard, TryLockError};

use glam::Vec3;

use crate::types::{PlanarBuffer, Pose, SourceKey};

/// Opaque per-room spatializer
///
/// Called from the audio thread only, one room at a time.
pub trait Spatializer: Send {
    /// Update the listener pose for this tick
    fn set_listener_transform(&mut self, listener: Pose);

    /// Register one emitter's samples for this tick
    ///
    /// `samples` is only borrowed for the duration of the call.
    fn add_emitter(
        &mut self,
        samples: &PlanarBuffer,
        emitter: Pose,
        room: Pose,
        key: SourceKey,
        volume: f32,
    );

    /// Render all emitters registered since the last call into `output`
    ///
    /// `output` arrives zeroed; `scratch` is working storage.
    fn simulate(&mut self, output: &mut PlanarBuffer, scratch: &mut PlanarBuffer);

    /// Release any per-emitter state held for a destroyed source
    fn remove_emitter(&mut self, _key: SourceKey) {}
}

/// A spatial audio zone with an attached spatializer
pub struct Room {
    spatializer: Mutex<Box<dyn Spatializer>>,
    /// Radius around the room position within which sources (and the
    /// listener) are considered inside the room. `None` = unbounded.
    source_radius: Option<f32>,
}

impl Room {
    pub fn new(spatializer: impl Spatializer + 'static) -> Self {
        Self {
            spatializer: Mutex::new(Box::new(spatializer)),
            source_radius: None,
        }
    }

    /// Restrict the room to a sphere of `radius` around its position
    pub fn with_source_radius(mut self, radius: f32) -> Self {
        self.source_radius = Some(radius.max(0.0));
        self
    }

    pub fn source_radius(&self) -> Option<f32> {
        self.source_radius
    }

    /// Whether `point` lies inside this room when placed at `room`
    #[inline]
    pub fn contains(&self, room: &Pose, point: Vec3) -> bool {
        match self.source_radius {
            Some(radius) => room.position.distance_squared(point) <= radius * radius,
            None => true,
        }
    }

    /// Lock the spatializer without blocking (audio thread)
    ///
    /// Returns `None` if another thread is configuring it right now; the room
    /// is then silent for this tick.
    pub(crate) fn try_spatializer(&self) -> Option<MutexGuard<'_, Box<dyn Spatializer>>> {
        match self.spatializer.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Run `f` against the spatializer from a non-real-time thread
    pub fn with_spatializer<R>(&self, f: impl FnOnce(&mut dyn Spatializer) -> R) -> R {
        let mut guard = self
            .spatializer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut **guard)
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("source_radius", &self.source_radius)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;

    impl Spatializer for Null {
        fn set_listener_transform(&mut self, _listener: Pose) {}
        fn add_emitter(&mut self, _: &PlanarBuffer, _: Pose, _: Pose, _: SourceKey, _: f32) {}
        fn simulate(&mut self, _: &mut PlanarBuffer, _: &mut PlanarBuffer) {}
    }

    #[test]
    fn test_unbounded_room_contains_everything() {
        let room = Room::new(Null);
        assert!(room.contains(&Pose::IDENTITY, Vec3::splat(1.0e6)));
    }

    #[test]
    fn test_source_radius() {
        let room = Room::new(Null).with_source_radius(10.0);
        let pose = Pose::at(Vec3::new(100.0, 0.0, 0.0));
        assert!(room.contains(&pose, Vec3::new(105.0, 0.0, 0.0)));
        assert!(room.contains(&pose, Vec3::new(110.0, 0.0, 0.0)));
        assert!(!room.contains(&pose, Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_try_spatializer_fails_while_locked() {
        let room = Room::new(Null);
        room.with_spatializer(|_| {
            // Re-entrant try from the "audio thread" must not block
            assert!(room.try_spatializer().is_none());
        });
        assert!(room.try_spatializer().is_some());
    }
}
