//! Top-level engine configuration

use serde::{Deserialize, Serialize};

use super::io::ConfigFile;
use super::RenderConfig;
use crate::audio::{AudioConfig, AudioResult};

/// Everything needed to bring up an engine and its output stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> AudioResult<()> {
        self.render.validate()
    }
}

impl ConfigFile for EngineConfig {
    fn validate(&self) -> AudioResult<()> {
        EngineConfig::validate(self)
    }
}
