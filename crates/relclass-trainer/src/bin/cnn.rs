//! Train and evaluate the CNN relation classifier.
//!
//! Usage: `DATA_ROOT=/data cnn cnn.cfg`
//!
//! The learned embedding table is written to `[data] weights` after training.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use relclass_core::config::{ExperimentConfig, ModelKind, data_root_from_env};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cnn")]
#[command(about = "Train a CNN relation classifier and report F1 on the test set")]
#[command(version)]
struct Cli {
    /// INI file with [data] and [cnn] sections
    config: PathBuf,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let data_root = data_root_from_env()?;
    let config = ExperimentConfig::load(&cli.config, ModelKind::Cnn)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    relclass_trainer::run(&config, &data_root, std::io::stdout().lock())?;
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("cnn failed: {e:#}");
        std::process::exit(1);
    }
}
