//! Updater Configuration Module
//!
//! Settings for the document codec, optionally loaded from a TOML file
//! passed with `--config`.
//!
//! ```toml
//! [codec]
//! preserve_header_comments = true
//! preserve_document_start = false
//! ```
//!
//! Missing keys fall back to their defaults.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, UpdaterError};

/// Top-level configuration file shape
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpdaterConfig {
    #[serde(default)]
    pub codec: CodecConfig,
}

/// Controls how much of the source layout survives re-serialization
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodecConfig {
    /// Re-attach the comment block preceding the first YAML content line
    pub preserve_header_comments: bool,

    /// Re-emit a leading `---` marker when the source had one
    pub preserve_document_start: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            preserve_header_comments: true,
            preserve_document_start: true,
        }
    }
}

impl UpdaterConfig {
    /// Load configuration from a TOML file
    ///
    /// Returns error if the file is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| UpdaterError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| UpdaterError::Config {
            reason: format!("Failed to parse config file: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_preserve_everything() {
        let config = UpdaterConfig::default();
        assert!(config.codec.preserve_header_comments);
        assert!(config.codec.preserve_document_start);
    }

    #[test]
    fn test_partial_codec_table_keeps_other_defaults() {
        let config = UpdaterConfig::from_toml("[codec]\npreserve_document_start = false\n").unwrap();
        assert!(config.codec.preserve_header_comments);
        assert!(!config.codec.preserve_document_start);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = UpdaterConfig::from_toml("").unwrap();
        assert_eq!(config, UpdaterConfig::default());
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let err = UpdaterConfig::from_toml("[codec\n").unwrap_err();
        assert_eq!(err.code(), "WFU-005");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("updater.toml");
        fs::write(&path, "[codec]\npreserve_header_comments = false\n").unwrap();

        let config = UpdaterConfig::load(&path).unwrap();
        assert!(!config.codec.preserve_header_comments);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = UpdaterConfig::load(&temp_dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
