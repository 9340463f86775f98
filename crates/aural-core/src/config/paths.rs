//! Path utilities for engine configuration files

use std::path::PathBuf;

/// File name of the engine configuration
pub const CONFIG_FILE_NAME: &str = "engine.yaml";

/// Directory holding aural configuration
///
/// Returns: `<platform config dir>/aural` (e.g. `~/.config/aural` on Linux),
/// falling back to `./aural` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aural")
}

/// Default engine config file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_aural() {
        assert!(default_config_dir().ends_with("aural"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        assert!(default_config_path().ends_with("aural/engine.yaml"));
    }
}
