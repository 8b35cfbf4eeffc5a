//! Capability boundary to the camera.
//!
//! The connection (USB or Wi-Fi after BLE pairing) and the camera's HTTP
//! command surface live outside this crate. Whatever sets the connection up
//! hands the sync engine an implementation of [`MediaCatalog`].

pub mod error;
pub mod types;

use std::path::Path;

pub use error::CatalogError;
pub use types::{MediaEntry, MediaMetadata, RawMediaMetadata};

/// Everything the sync engine needs from a connected camera.
#[async_trait::async_trait]
pub trait MediaCatalog: Send + Sync {
    /// List every media file currently on the camera. Entries carry only
    /// their path.
    async fn list_media(&self) -> Result<Vec<MediaEntry>, CatalogError>;

    /// Fetch capture time and size for one file.
    async fn media_metadata(&self, path: &str) -> Result<MediaMetadata, CatalogError>;

    /// Copy the bytes of `path` to `local_destination`, creating or
    /// truncating it.
    async fn download(&self, path: &str, local_destination: &Path) -> Result<(), CatalogError>;

    /// Toggle the camera's high-throughput transfer mode.
    async fn set_performance_mode(&self, enabled: bool) -> Result<(), CatalogError>;
}
