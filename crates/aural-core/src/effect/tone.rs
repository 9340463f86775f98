//! Tone generator node
//!
//! Adds a sine tone to every channel of the listener mix. Handy as a
//! reference signal when checking device output without any sources.

use super::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::PlanarBuffer;

const PARAM_FREQUENCY: usize = 0;
const PARAM_LEVEL: usize = 1;

pub struct ToneEffect {
    base: EffectBase,
    sample_rate: f32,
    /// Oscillator phase in cycles, [0, 1)
    phase: f32,
}

impl ToneEffect {
    pub fn new(sample_rate: u32) -> Self {
        let info = EffectInfo::new("Tone", "Generator")
            .with_param(
                ParamInfo::new("Frequency", 0.2)
                    .with_range(20.0, 2000.0)
                    .with_unit("Hz"),
            )
            .with_param(ParamInfo::new("Level", 0.0));
        Self {
            base: EffectBase::new(info),
            sample_rate: sample_rate.max(1) as f32,
            phase: 0.0,
        }
    }
}

impl Effect for ToneEffect {
    fn process(&mut self, buffer: &mut PlanarBuffer, _scratch: &mut PlanarBuffer) {
        let level = self.base.param_actual(PARAM_LEVEL);
        if self.base.is_bypassed() || level <= 0.0 {
            return;
        }

        let step = self.base.param_actual(PARAM_FREQUENCY) / self.sample_rate;
        let start = self.phase;
        let frames = buffer.frames();

        for ch in 0..buffer.channels() {
            let mut phase = start;
            for s in buffer.channel_mut(ch) {
                *s += level * (phase * std::f32::consts::TAU).sin();
                phase = (phase + step).fract();
            }
        }
        self.phase = (start + step * frames as f32).fract();
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.base.set_param(index, value);
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_at_zero_level() {
        let mut tone = ToneEffect::new(48000);
        let mut buf = PlanarBuffer::new(2, 64);
        let mut scratch = PlanarBuffer::new(2, 64);
        tone.process(&mut buf, &mut scratch);
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn test_adds_tone_at_level() {
        let mut tone = ToneEffect::new(48000);
        tone.set_param(PARAM_LEVEL, 0.5);
        let mut buf = PlanarBuffer::new(2, 480);
        let mut scratch = PlanarBuffer::new(2, 480);
        tone.process(&mut buf, &mut scratch);

        let peak = buf.peak();
        assert!(peak > 0.45 && peak <= 0.5 + 1e-6, "peak {}", peak);
        assert_eq!(buf.channel(0), buf.channel(1));
    }

    #[test]
    fn test_phase_continues_across_periods() {
        let mut long = ToneEffect::new(48000);
        let mut short = ToneEffect::new(48000);
        long.set_param(PARAM_LEVEL, 1.0);
        short.set_param(PARAM_LEVEL, 1.0);

        let mut a = PlanarBuffer::new(1, 128);
        let mut b1 = PlanarBuffer::new(1, 64);
        let mut b2 = PlanarBuffer::new(1, 64);
        let mut scratch = PlanarBuffer::new(1, 128);
        long.process(&mut a, &mut scratch);
        short.process(&mut b1, &mut scratch);
        short.process(&mut b2, &mut scratch);

        for (x, y) in a.channel(0)[64..].iter().zip(b2.channel(0)) {
            assert!((x - y).abs() < 1e-3);
        }
    }
}
