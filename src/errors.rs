// src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

/// The territory table is the one input the pipeline cannot run without.
/// Returned wrapped in `anyhow::Error`; callers can `downcast_ref` it.
#[derive(Debug, Error)]
pub enum TerritoryLoadError {
    #[error("territory file {path} could not be read: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("territory file {path} has unsupported extension")]
    UnsupportedFormat { path: PathBuf },

    #[error("territory file {path} is missing required column(s): {missing}")]
    MissingColumns { path: PathBuf, missing: String },

    #[error("territory file {path} contains no usable rows")]
    Empty { path: PathBuf },
}
