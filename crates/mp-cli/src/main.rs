//! mvaprep CLI

use anyhow::{Context, Result};
use clap::Parser;
use mp_dataset::{DatasetBuilder, DatasetPlan};
use mp_table::ParquetStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mvaprep")]
#[command(about = "Create a fold-split training dataset from event ntuples")]
#[command(version)]
struct Cli {
    /// Dataset configuration (YAML)
    config: PathBuf,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "debug")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let plan = DatasetPlan::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    tracing::info!(
        config = %cli.config.display(),
        processes = plan.processes.len(),
        friends = plan.config.friend_dirs.len(),
        "loaded dataset config"
    );

    let store = ParquetStore::default();
    let report = DatasetBuilder::new(&plan, &store).build().context("dataset build failed")?;

    for m in &report.merged {
        println!("{}", m.path.display());
    }
    tracing::info!(units = report.units.len(), merged = report.merged.len(), "done");
    Ok(())
}
