mod config;
mod dates;
mod fusion;
mod project;
mod raster;
mod spatial;
mod table;
mod vector;

use anyhow::Context;
use clap::Parser;
use log::{LevelFilter, info};
use std::path::PathBuf;

use config::FusionConfig;
use fusion::FusionEngine;

/// Fuses SAR-derived raster and vector measurements into a pavement
/// condition record table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON job description
    config: PathBuf,

    /// Keep records without a valid sample instead of dropping them
    #[arg(long)]
    keep_bad: bool,

    /// Attach rate-of-change columns between consecutive epochs
    #[arg(long)]
    differential: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let mut config = FusionConfig::from_file(&cli.config)
        .with_context(|| format!("reading job description {}", cli.config.display()))?;
    if cli.keep_bad {
        config.set_keep_bad(true);
    }
    if cli.differential {
        config.set_differential(true);
    }

    let engine = FusionEngine::new(config);
    let report = engine.run().context("fusion run failed")?;

    info!(
        "fused {} of {} records into {} columns",
        report.rows_out, report.rows_in, report.columns_out
    );
    for path in &report.outputs {
        info!("wrote {}", path.display());
    }

    Ok(())
}
