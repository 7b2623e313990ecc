//! Error types with fix suggestions

use std::path::PathBuf;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T> = std::result::Result<T, UpdaterError>;

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("WFU-001: Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("WFU-002: YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("WFU-003: Failed to serialize document: {source}")]
    Serialize { source: serde_yaml::Error },

    #[error("WFU-004: Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("WFU-005: Invalid configuration: {reason}")]
    Config { reason: String },
}

impl UpdaterError {
    /// Get the error code (e.g., "WFU-002")
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "WFU-001",
            Self::Parse(_) => "WFU-002",
            Self::Serialize { .. } => "WFU-003",
            Self::Write { .. } => "WFU-004",
            Self::Config { .. } => "WFU-005",
        }
    }
}

impl FixSuggestion for UpdaterError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            UpdaterError::Read { .. } => Some("Check file path and permissions"),
            UpdaterError::Parse(_) => Some("Check YAML syntax: indentation and quoting"),
            UpdaterError::Serialize { .. } => None,
            UpdaterError::Write { .. } => Some("Check the file is writable"),
            UpdaterError::Config { .. } => {
                Some("Config is TOML with an optional [codec] table of boolean keys")
            }
        }
    }
}
