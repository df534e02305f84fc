// src/bin/set_activity_status.rs
//
// Writes one activity status entry to the overlay store. The key is derived
// from the business name and address with the same function the pipeline
// uses, so entries written here attach to the right resolved record.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use linkage_lib::config::PipelineConfig;
use linkage_lib::dedup::DEGENERATE_KEY;
use linkage_lib::normalize::identity_key;
use linkage_lib::overlay::{JsonFileStatusStore, StatusOverlayStore};
use linkage_lib::utils::env::{load_env, log_env_source, now_kst};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct StatusArgs {
    /// Business name as it appears in the permit extract
    #[arg(long)]
    name: String,

    /// Business address as it appears in the permit extract
    #[arg(long)]
    address: String,

    /// New activity status (e.g. 방문, 상담중, 계약완료)
    #[arg(long)]
    status: String,

    #[arg(long, default_value = "")]
    notes: String,

    /// Who made the change
    #[arg(long)]
    author: String,

    /// Status overlay file; overrides OVERLAY_PATH
    #[arg(long)]
    overlay: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env_source = load_env();
    env_logger::init();
    log_env_source(env_source.as_deref());
    let args = StatusArgs::parse();

    let path = args
        .overlay
        .unwrap_or_else(|| PipelineConfig::from_env().overlay_path);
    let store = JsonFileStatusStore::new(path);

    let key = identity_key(&args.name, &args.address);
    if key == DEGENERATE_KEY {
        anyhow::bail!("name and address are both empty; refusing to write a degenerate key");
    }

    store
        .set(&key, &args.status, &args.notes, &args.author, now_kst())
        .with_context(|| format!("Failed to update {}", store.path().display()))?;
    let entry = store.get(&key)?.unwrap_or_default();
    info!(
        "Set {} -> {} ({}) in {}",
        key,
        entry.status,
        entry.changed_at,
        store.path().display()
    );
    Ok(())
}
