//! Common types for Aural
//!
//! This module contains the fundamental audio types shared by the simulation
//! thread, the render workers and the audio thread: planar sample buffers,
//! listener/emitter poses and the identifiers that tie them together.

use glam::{Quat, Vec3};

/// Default sample rate requested from the output device (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Default channel count requested from the output device
pub const CHANNELS: u16 = 2;

/// Audio sample type (32-bit float, range-normalized to [-1, 1] on output)
pub type Sample = f32;

/// Identifier of one device callback's unit of work
///
/// Starts at 0 and advances by exactly one at the end of every callback.
pub type ProcessingId = u64;

/// Stable per-source identity
///
/// Rooms use this as the emitter key, so it must not change for the lifetime
/// of the source. Keys are never reused within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(pub u64);

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// World-space position and orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    /// The world origin, facing forward
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// A pose at `position` with identity rotation
    #[inline]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Express a world-space point in this pose's local frame
    #[inline]
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A channel-major (planar) buffer of one buffer period
///
/// Layout is `[ch0 frame0..frameN, ch1 frame0..frameN, ...]`. Sources,
/// rooms and effect graphs all render into this format; only the device
/// accumulator is interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarBuffer {
    samples: Vec<Sample>,
    channels: usize,
    frames: usize,
}

impl PlanarBuffer {
    /// Allocate a silent buffer of `channels` x `frames`
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            samples: vec![0.0; channels * frames],
            channels,
            frames,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Total sample count across all channels
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[Sample] {
        &self.samples[ch * self.frames..(ch + 1) * self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [Sample] {
        &mut self.samples[ch * self.frames..(ch + 1) * self.frames]
    }

    #[inline]
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    /// Fill every sample with `value`
    pub fn fill(&mut self, value: Sample) {
        self.samples.fill(value);
    }

    pub fn fill_silence(&mut self) {
        self.samples.fill(0.0);
    }

    /// Multiply every sample by `gain`
    pub fn scale(&mut self, gain: Sample) {
        for s in &mut self.samples {
            *s *= gain;
        }
    }

    /// Additively mix another planar buffer of the same shape into this one
    #[inline]
    pub fn add_from(&mut self, other: &PlanarBuffer) {
        debug_assert_eq!(self.samples.len(), other.samples.len());
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            *dst += *src;
        }
    }

    /// Additively mix `other * gain` into this buffer
    #[inline]
    pub fn add_scaled_from(&mut self, other: &PlanarBuffer, gain: Sample) {
        debug_assert_eq!(self.samples.len(), other.samples.len());
        for (dst, src) in self.samples.iter_mut().zip(&other.samples) {
            *dst += *src * gain;
        }
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> Sample {
        self.samples.iter().fold(0.0, |acc: Sample, s| acc.max(s.abs()))
    }
}

/// Fused planar-to-interleaved additive blend
///
/// For interleaved index `i` over `C` channels: `accum[i] += planar[i % C][i / C]`.
/// `accum` and `planar` are distinct borrows, so the compiler is free to
/// vectorize the per-channel inner loop.
#[inline]
pub fn blend_into_interleaved(accum: &mut [Sample], planar: &PlanarBuffer) {
    let channels = planar.channels;
    let frames = planar.frames;
    if channels == 0 || frames == 0 {
        return;
    }
    debug_assert!(accum.len() <= channels * frames);

    if channels == 1 {
        for (dst, src) in accum.iter_mut().zip(&planar.samples) {
            *dst += *src;
        }
        return;
    }

    for (frame, out) in accum.chunks_exact_mut(channels).enumerate() {
        for (ch, dst) in out.iter_mut().enumerate() {
            *dst += planar.samples[ch * frames + frame];
        }
    }
}

/// Hard limiter: clamp every sample to the closed range [-1, 1]
///
/// NaN becomes silence.
#[inline]
pub fn hard_clip(buffer: &mut [Sample]) {
    for s in buffer {
        *s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
    }
}
