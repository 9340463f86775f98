//! YAML persistence for engine configuration
//!
//! A config file is optional. Missing, unreadable, malformed or invalid files
//! never stop the engine from starting: the loader logs why and falls back to
//! the type's defaults.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::audio::AudioResult;

/// A configuration type that can be stored as YAML
pub trait ConfigFile: DeserializeOwned + Serialize + Default {
    /// Reject settings the engine cannot run with
    fn validate(&self) -> AudioResult<()>;
}

fn read_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
}

/// Load a configuration, falling back to defaults
///
/// A file that parses but fails [`ConfigFile::validate`] is discarded as a
/// whole, so the returned value always validates unless `T::default()` does not.
pub fn load_config<T: ConfigFile>(path: &Path) -> T {
    if !path.exists() {
        log::info!("No config at {:?}, using defaults", path);
        return T::default();
    }

    let config: T = match read_config(path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            return T::default();
        }
    };

    match config.validate() {
        Ok(()) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("Ignoring config at {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write a configuration as YAML, creating parent directories
pub fn save_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    log::info!("Saved config to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, RenderConfig};

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: EngineConfig = load_config(Path::new("/nonexistent/path/engine.yaml"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "render: [this is not a map").unwrap();

        let config: EngineConfig = load_config(&path);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_failing_validation_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "render:\n  ring_depth: 1\n").unwrap();

        let config: EngineConfig = load_config(&path);
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deadline_exceeding_ring_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        let yaml = "render:\n  ring_depth: 3\n  lookahead: 2\n  grace: 1\n";
        std::fs::write(&path, yaml).unwrap();

        let config: EngineConfig = load_config(&path);
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_roundtrip_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.yaml");

        let mut config = EngineConfig::default();
        config.render = RenderConfig {
            ring_depth: 5,
            lookahead: 3,
            grace: 1,
            ..RenderConfig::default()
        };
        config.audio = config.audio.with_buffer_frames(128).with_sample_rate(44100);

        save_config(&config, &path).unwrap();
        let loaded: EngineConfig = load_config(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "render:\n  grace: 1\n").unwrap();

        let config: EngineConfig = load_config(&path);
        assert_eq!(config.render.grace, 1);
        assert_eq!(config.render.ring_depth, RenderConfig::default().ring_depth);
        assert_eq!(config.audio.sample_rate, 48000);
    }
}
