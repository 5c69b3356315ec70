// src/bin/clean_export.rs
//! Rewrites the all-facilities export as the five-field clean projection.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use facility_lib::export::{read_records, write_slim_json, ALL_FACILITIES_JSON, CLEAN_JSON};
use facility_lib::utils::env::load_env;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct CleanExportArgs {
    /// Full-schema JSON produced by the aggregate binary
    #[arg(long)]
    input: Option<PathBuf>,

    /// Destination of the clean JSON
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn output_dir() -> PathBuf {
    std::env::var("OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("output"))
}

fn main() -> Result<()> {
    let args = CleanExportArgs::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::init_from_env(Env::default().default_filter_or(default_filter));
    load_env();

    let input = args.input.unwrap_or_else(|| output_dir().join(ALL_FACILITIES_JSON));
    let output = args.output.unwrap_or_else(|| output_dir().join(CLEAN_JSON));

    info!("Reading facilities from {}", input.display());
    let records = read_records(&input)
        .with_context(|| format!("Run the aggregate binary first to produce {}", input.display()))?;
    if records.is_empty() {
        warn!("{} contains no records", input.display());
    }

    let written = write_slim_json(&output, &records)
        .with_context(|| format!("Failed to write clean export {}", output.display()))?;
    info!("Saved {} clean records to {}", written, output.display());
    Ok(())
}
