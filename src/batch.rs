//! Batch processing over a list of workflow files
//!
//! Files are handled one at a time. A file that cannot be read, parsed or
//! written is reported as a warning and skipped; it never aborts the batch.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::dispatch::Updater;
use crate::error::{Result, UpdaterError};

/// Exit status: no errors, nothing pending
pub const EXIT_OK: u8 = 0;
/// Exit status: invalid invocation (mode or files missing, bad config)
pub const EXIT_USAGE: u8 = 2;
/// Exit status: check mode found files needing an update
pub const EXIT_NEEDS_UPDATE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report files that would change; leave them on disk as-is
    Check,
    /// Overwrite changed files in place
    Write,
}

/// What happened across a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files that needed (check) or received (write) changes
    pub changed: Vec<PathBuf>,
    /// Files skipped with the error message that caused it
    pub skipped: Vec<(PathBuf, String)>,
    pub processed: usize,
}

impl BatchReport {
    pub fn exit_code(&self, mode: Mode) -> u8 {
        if mode == Mode::Check && !self.changed.is_empty() {
            EXIT_NEEDS_UPDATE
        } else {
            EXIT_OK
        }
    }
}

/// Process `files` in order, writing one report line per changed or
/// skipped file to `out`
pub fn run<W: Write>(
    updater: &Updater,
    mode: Mode,
    files: &[PathBuf],
    out: &mut W,
) -> io::Result<BatchReport> {
    let mut report = BatchReport::default();

    for path in files {
        report.processed += 1;
        match process_file(updater, mode, path) {
            Ok(false) => {}
            Ok(true) => {
                match mode {
                    Mode::Write => writeln!(out, "updated: {}", path.display())?,
                    Mode::Check => writeln!(out, "NEEDS UPDATE: {}", path.display())?,
                }
                report.changed.push(path.clone());
            }
            Err(e) => {
                warn!(path = %path.display(), code = e.code(), "skipping file");
                writeln!(out, "::warning::Skipping {}: {}", path.display(), e)?;
                report.skipped.push((path.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}

fn process_file(updater: &Updater, mode: Mode, path: &Path) -> Result<bool> {
    let outcome = updater.apply(path)?;
    if outcome.changed && mode == Mode::Write {
        fs::write(path, outcome.text.as_bytes()).map_err(|source| UpdaterError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(outcome.changed)
}
