//! Engine configuration
//!
//! - YAML config loading/saving with validation
//! - Default config location
//! - Render scheduling settings ([`RenderConfig`]) and the top-level
//!   [`EngineConfig`] combining them with the output device settings
//!
//! # Usage
//!
//! ```ignore
//! use aural_core::config::{load_config, save_config, default_config_path, EngineConfig};
//!
//! let path = default_config_path();
//! // Invalid files fall back to defaults, so this always validates
//! let config: EngineConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod engine;
mod io;
mod paths;
mod render;

pub use engine::EngineConfig;
pub use io::{load_config, save_config, ConfigFile};
pub use paths::{default_config_dir, default_config_path, CONFIG_FILE_NAME};
pub use render::RenderConfig;
