//! Workflow updater - idempotent structural patches for CI workflow YAML

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod step;
pub mod transforms;

pub use batch::{BatchReport, Mode};
pub use config::{CodecConfig, UpdaterConfig};
pub use dispatch::{Identity, Outcome, Rule, Transform, Updater, RULES};
pub use document::{Codec, Document};
pub use error::{FixSuggestion, UpdaterError};
