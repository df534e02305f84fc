// src/utils/env.rs
use chrono::{Duration, NaiveDateTime, Utc};
use log::{debug, info};
use std::path::{Path, PathBuf};

use super::constants::KST_OFFSET_HOURS;

/// Loads a `.env` file from the working directory (or a parent) if one
/// exists. Variables already present in the process environment win.
/// Call before initializing the logger so `RUST_LOG` from the file applies.
pub fn load_env() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

/// Reports the outcome of [`load_env`] once logging is up.
pub fn log_env_source(source: Option<&Path>) {
    match source {
        Some(path) => info!("Loaded environment from {}", path.display()),
        None => debug!("No .env file loaded"),
    }
}

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is unset or unparseable.
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Current wall-clock time in KST, without offset.
pub fn now_kst() -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::hours(KST_OFFSET_HOURS as i64)
}
