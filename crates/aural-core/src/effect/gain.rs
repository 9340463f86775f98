//! Gain node

use super::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::PlanarBuffer;

/// Scales the listener mix
///
/// Parameters:
/// - Gain: multiplier from 0.0 (silence) to 2.0, unity at normalized 0.5
pub struct GainEffect {
    base: EffectBase,
}

impl GainEffect {
    pub fn new() -> Self {
        let info = EffectInfo::new("Gain", "Utility").with_param(
            ParamInfo::new("Gain", 0.5)
                .with_range(0.0, 2.0)
                .with_unit("×"),
        );
        Self {
            base: EffectBase::new(info),
        }
    }
}

impl Default for GainEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for GainEffect {
    fn process(&mut self, buffer: &mut PlanarBuffer, _scratch: &mut PlanarBuffer) {
        if self.base.is_bypassed() {
            return;
        }
        buffer.scale(self.base.param_actual(0));
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

    fn reset(&mut self) {}
}
