use thiserror::Error;

use crate::catalog::CatalogError;
use crate::state::StateError;

/// Typed per-file download errors.
///
/// `is_retryable()` singles out connection-level transfer failures, the only
/// class the engine retries. Everything else is terminal for the file.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Cannot derive a local filename from {0:?}")]
    InvalidPath(String),

    #[error("Failed to fetch metadata for {path}: {source}")]
    Metadata {
        path: String,
        source: CatalogError,
    },

    #[error("Transfer of {path} failed: {source}")]
    Transfer {
        path: String,
        source: CatalogError,
    },

    #[error("Transfer of {path} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        path: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Transfer of {path} cancelled after {attempts} attempts: {last_error}")]
    Cancelled {
        path: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error(transparent)]
    Watermark(#[from] StateError),
}

impl DownloadError {
    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Transfer { source, .. } => source.is_transient(),
            DownloadError::InvalidPath(_)
            | DownloadError::Metadata { .. }
            | DownloadError::RetriesExhausted { .. }
            | DownloadError::Cancelled { .. }
            | DownloadError::Disk(_)
            | DownloadError::Watermark(_) => false,
        }
    }
}
