//! Listener effect graphs
//!
//! A listener-attached effect graph is an ordered chain of [`Effect`] nodes
//! run once per tick on the audio thread. Nodes either transform the buffer
//! they are handed (gain) or add a signal of their own (tone generator).
//! Parameters are normalized to 0.0-1.0 and mapped onto each node's range.

mod gain;
mod graph;
mod tone;

pub use gain::GainEffect;
pub use graph::{EffectGraph, ListenerGraph};
pub use tone::ToneEffect;

use crate::types::PlanarBuffer;

/// Description of one effect parameter
#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    /// Default value (normalized)
    pub default: f32,
    /// Actual value at normalized 0.0
    pub min: f32,
    /// Actual value at normalized 1.0
    pub max: f32,
    /// Unit label (e.g., "Hz", "×")
    pub unit: String,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Map a normalized value onto this parameter's range
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.min + normalized.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

/// Current value of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamValue {
    pub normalized: f32,
    pub actual: f32,
}

impl ParamValue {
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        let normalized = normalized.clamp(0.0, 1.0);
        Self {
            normalized,
            actual: info.denormalize(normalized),
        }
    }
}

/// Name, category and parameters of an effect
#[derive(Debug, Clone)]
pub struct EffectInfo {
    pub name: String,
    pub category: String,
    pub params: Vec<ParamInfo>,
}

impl EffectInfo {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// A node of a listener effect graph
///
/// `process` runs on the audio thread and must not allocate or block.
pub trait Effect: Send {
    /// Process one period in place; `scratch` has the same shape as `buffer`
    fn process(&mut self, buffer: &mut PlanarBuffer, scratch: &mut PlanarBuffer);

    fn info(&self) -> &EffectInfo;

    fn get_params(&self) -> &[ParamValue];

    /// Set a parameter by index (normalized 0.0-1.0); out-of-range indices are ignored
    fn set_param(&mut self, index: usize, value: f32);

    fn set_bypass(&mut self, bypass: bool);

    fn is_bypassed(&self) -> bool;

    /// Clear internal state (oscillator phase, filter history)
    fn reset(&mut self);
}

/// Parameter storage and bypass flag shared by the built-in effects
#[derive(Debug, Clone)]
pub struct EffectBase {
    info: EffectInfo,
    params: Vec<ParamValue>,
    bypassed: bool,
}

impl EffectBase {
    pub fn new(info: EffectInfo) -> Self {
        let params = info
            .params
            .iter()
            .map(|p| ParamValue::from_normalized(p.default, p))
            .collect();
        Self {
            info,
            params,
            bypassed: false,
        }
    }

    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    pub fn get_params(&self) -> &[ParamValue] {
        &self.params
    }

    pub fn set_param(&mut self, index: usize, value: f32) {
        if let (Some(slot), Some(info)) = (self.params.get_mut(index), self.info.params.get(index)) {
            *slot = ParamValue::from_normalized(value, info);
        }
    }

    /// Actual (denormalized) value, 0.0 for unknown indices
    pub fn param_actual(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.actual).unwrap_or(0.0)
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}
