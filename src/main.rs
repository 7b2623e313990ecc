//! update-workflows CLI

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use workflow_updater::batch::{self, Mode, EXIT_USAGE};
use workflow_updater::{Codec, FixSuggestion, Updater, UpdaterConfig, UpdaterError};

#[derive(Parser)]
#[command(name = "update-workflows")]
#[command(about = "Apply idempotent structural patches to CI workflow files")]
#[command(version)]
#[command(group(ArgGroup::new("mode").required(true).args(["check", "write"])))]
struct Cli {
    /// Report files needing changes without modifying them (exit 3 if any)
    #[arg(long)]
    check: bool,

    /// Write changes back to the files in place
    #[arg(long)]
    write: bool,

    /// TOML file with [codec] settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Workflow files to process
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if let Some(suggestion) = e
                .downcast_ref::<UpdaterError>()
                .and_then(|err| err.fix_suggestion())
            {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let mode = if cli.write { Mode::Write } else { Mode::Check };
    let updater = Updater::new(Codec::new(config.codec));

    let report = match batch::run(&updater, mode, &cli.files, &mut io::stdout().lock()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        processed = report.processed,
        changed = report.changed.len(),
        skipped = report.skipped.len(),
        "batch complete"
    );
    if mode == Mode::Check && !report.changed.is_empty() {
        eprintln!(
            "{} {} file(s) need updating; rerun with --write",
            "→".cyan(),
            report.changed.len()
        );
    }

    ExitCode::from(report.exit_code(mode))
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<UpdaterConfig> {
    match path {
        Some(path) => UpdaterConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(UpdaterConfig::default()),
    }
}
