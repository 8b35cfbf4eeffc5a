//! Persistent sync state.
//!
//! The only state kept between runs is the watermark: the remote path of the
//! last file that was fully downloaded. Everything that sorts at or below it
//! is considered synced.

pub mod error;
pub mod watermark;

pub use error::StateError;
pub use watermark::{FileWatermarkStore, Watermark, WatermarkStore, WATERMARK_FILE_NAME};
