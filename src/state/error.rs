//! Error types for the sync state module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or persisting the watermark.
#[derive(Error, Debug)]
pub enum StateError {
    /// The watermark file exists but could not be read.
    #[error("Failed to read watermark at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The watermark could not be written or moved into place.
    #[error("Failed to write watermark at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
