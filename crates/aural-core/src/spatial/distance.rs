//! Distance-attenuating spatializer with equal-power stereo panning
//!
//! A lightweight stand-in for a full acoustic simulator: each emitter is
//! downmixed to mono, attenuated by inverse distance to the listener and
//! panned by its azimuth in the listener's frame. Channels beyond the first
//! two receive the unpanned signal.

use glam::Vec3;

use super::Spatializer;
use crate::types::{PlanarBuffer, Pose, SourceKey};

/// Inverse-distance spatializer
pub struct DistanceSpatializer {
    listener: Pose,
    /// Distance below which no attenuation is applied
    reference_distance: f32,
    /// Sum of all emitters registered this tick
    pending: PlanarBuffer,
    emitters: usize,
}

impl DistanceSpatializer {
    /// Create a spatializer for buffers of `channels` x `frames`
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            listener: Pose::IDENTITY,
            reference_distance: 1.0,
            pending: PlanarBuffer::new(channels, frames),
            emitters: 0,
        }
    }

    pub fn with_reference_distance(mut self, distance: f32) -> Self {
        self.reference_distance = distance.max(f32::EPSILON);
        self
    }

    /// Emitters registered since the last `simulate`
    pub fn pending_emitters(&self) -> usize {
        self.emitters
    }

    /// Per-channel gains for an emitter at `position`
    fn gains(&self, position: Vec3, volume: f32) -> (f32, f32, f32) {
        let local = self.listener.to_local(position);
        let distance = local.length();
        let attenuation = self.reference_distance / distance.max(self.reference_distance);
        let gain = volume * attenuation;

        // Azimuth in [-1, 1]: -1 = hard left, +1 = hard right
        let pan = if distance > f32::EPSILON {
            (local.x / distance).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
        (gain * angle.cos(), gain * angle.sin(), gain)
    }
}

impl Spatializer for DistanceSpatializer {
    fn set_listener_transform(&mut self, listener: Pose) {
        self.listener = listener;
    }

    fn add_emitter(
        &mut self,
        samples: &PlanarBuffer,
        emitter: Pose,
        _room: Pose,
        _key: SourceKey,
        volume: f32,
    ) {
        let frames = self.pending.frames().min(samples.frames());
        let src_channels = samples.channels().max(1);
        let downmix = 1.0 / src_channels as f32;
        let (left, right, center) = self.gains(emitter.position, volume);

        for ch in 0..self.pending.channels() {
            let gain = match (self.pending.channels(), ch) {
                (1, _) => center,
                (_, 0) => left,
                (_, 1) => right,
                _ => center,
            } * downmix;

            let out = self.pending.channel_mut(ch);
            for src_ch in 0..samples.channels() {
                for (dst, s) in out[..frames].iter_mut().zip(samples.channel(src_ch)) {
                    *dst += *s * gain;
                }
            }
        }
        self.emitters += 1;
    }

    fn simulate(&mut self, output: &mut PlanarBuffer, _scratch: &mut PlanarBuffer) {
        if self.emitters > 0 {
            output.add_from(&self.pending);
            self.pending.fill_silence();
        }
        self.emitters = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(channels: usize, frames: usize, value: f32) -> PlanarBuffer {
        let mut buf = PlanarBuffer::new(channels, frames);
        buf.fill(value);
        buf
    }

    #[test]
    fn test_centered_emitter_is_equal_power() {
        let mut spatializer = DistanceSpatializer::new(2, 8);
        spatializer.set_listener_transform(Pose::IDENTITY);
        spatializer.add_emitter(
            &constant(1, 8, 1.0),
            Pose::at(Vec3::new(0.0, 0.0, -1.0)),
            Pose::IDENTITY,
            SourceKey(1),
            1.0,
        );

        let mut out = PlanarBuffer::new(2, 8);
        let mut scratch = PlanarBuffer::new(2, 8);
        spatializer.simulate(&mut out, &mut scratch);

        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out.channel(0)[0] - expected).abs() < 1e-5);
        assert!((out.channel(1)[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_distance_attenuation() {
        let mut spatializer = DistanceSpatializer::new(1, 4);
        spatializer.add_emitter(
            &constant(1, 4, 1.0),
            Pose::at(Vec3::new(0.0, 0.0, -4.0)),
            Pose::IDENTITY,
            SourceKey(1),
            0.5,
        );

        let mut out = PlanarBuffer::new(1, 4);
        let mut scratch = PlanarBuffer::new(1, 4);
        spatializer.simulate(&mut out, &mut scratch);

        assert!((out.channel(0)[0] - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_simulate_consumes_pending() {
        let mut spatializer = DistanceSpatializer::new(1, 4);
        spatializer.add_emitter(
            &constant(1, 4, 1.0),
            Pose::IDENTITY,
            Pose::IDENTITY,
            SourceKey(1),
            1.0,
        );
        assert_eq!(spatializer.pending_emitters(), 1);

        let mut out = PlanarBuffer::new(1, 4);
        let mut scratch = PlanarBuffer::new(1, 4);
        spatializer.simulate(&mut out, &mut scratch);
        assert_eq!(spatializer.pending_emitters(), 0);

        let mut second = PlanarBuffer::new(1, 4);
        spatializer.simulate(&mut second, &mut scratch);
        assert_eq!(second.peak(), 0.0);
    }
}
