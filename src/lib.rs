//! Incremental media sync from a GoPro camera to local disk.
//!
//! A pass lists the camera's media, keeps only the files that sort after the
//! persisted watermark, and downloads them one at a time with turbo transfer
//! enabled for the batch. Transient connection failures are retried with a
//! fixed delay. The watermark advances after each completed file, so an
//! interrupted pass resumes where it stopped.
//!
//! Connecting to the camera is out of scope: callers hand [`Syncer`] an
//! already-connected [`MediaCatalog`].

#![warn(clippy::all)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod download;
pub mod logging;
pub mod plan;
pub mod retry;
pub mod shutdown;
pub mod state;
pub mod types;

#[cfg(test)]
mod test_support;

pub use catalog::{CatalogError, MediaCatalog, MediaEntry, MediaMetadata};
pub use download::{DownloadConfig, DownloadError, SyncError, SyncPhase, SyncReport, Syncer};
pub use state::{FileWatermarkStore, Watermark, WatermarkStore};
