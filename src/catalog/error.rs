use thiserror::Error;

/// Failures reported by a [`MediaCatalog`](super::MediaCatalog) implementation.
///
/// Only [`CatalogError::Connection`] is transient: the download engine
/// retries it, everything else is surfaced to the caller as-is.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Camera rejected request for {path}: {reason}")]
    Device { path: String, reason: String },

    #[error("Invalid media metadata: {0}")]
    InvalidMetadata(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CatalogError {
    /// Whether the failure happened at the connection level and is worth
    /// another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Connection(_))
    }
}
