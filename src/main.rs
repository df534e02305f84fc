// src/main.rs - Runs one permit linkage load and writes the resolved dataset
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use linkage_lib::config::PipelineConfig;
use linkage_lib::overlay::JsonFileStatusStore;
use linkage_lib::pipeline::{Pipeline, PipelineInput};
use linkage_lib::utils::env::{load_env, log_env_source};
use linkage_lib::utils::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct LinkageArgs {
    /// Permit/closure archive(s), in precedence order for deduplication
    #[arg(long = "archive", required = true)]
    archives: Vec<PathBuf>,

    /// Territory assignment sheet (.xlsx/.xls/.ods or .csv)
    #[arg(long)]
    territory: PathBuf,

    /// Status overlay file; overrides OVERLAY_PATH
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Where to write the resolved dataset as JSON
    #[arg(long, default_value = "resolved_dataset.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    // Initialize logging and environment
    let env_source = load_env();
    env_logger::init();
    log_env_source(env_source.as_deref());
    let args = LinkageArgs::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(overlay) = args.overlay {
        config.overlay_path = overlay;
    }
    config.log_config();

    let progress = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress.enabled, progress.detailed
    );

    let store = JsonFileStatusStore::new(config.overlay_path.clone());
    let mut pipeline = Pipeline::new(config, progress, store);
    let input = PipelineInput {
        archives: args.archives,
        territory: args.territory,
    };
    let dataset = pipeline.run(&input).context("Permit linkage load failed")?;

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &dataset)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        "Wrote {} resolved records to {}",
        dataset.records.len(),
        args.output.display()
    );
    Ok(())
}
