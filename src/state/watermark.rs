//! Watermark trait and its file-backed implementation.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::StateError;

/// Name of the watermark file inside the state directory.
pub const WATERMARK_FILE_NAME: &str = ".last-downloaded.txt";

/// Remote path of the last file that completed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Watermark(String);

impl Watermark {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for the sync watermark.
///
/// This trait is object-safe so the engine can hold an
/// `Arc<dyn WatermarkStore>`.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Return the last persisted watermark, or `None` on a first run.
    async fn read(&self) -> Result<Option<Watermark>, StateError>;

    /// Persist `path` as the new watermark, replacing the previous one.
    ///
    /// Called once per completed file, so it must be cheap and must never
    /// leave a half-written value behind.
    async fn write(&self, path: &str) -> Result<(), StateError>;
}

/// Keeps the watermark in a small text file holding exactly the remote path.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Store the watermark as [`WATERMARK_FILE_NAME`] inside `state_directory`.
    pub fn new(state_directory: &Path) -> Self {
        Self {
            path: state_directory.join(WATERMARK_FILE_NAME),
        }
    }

    /// Path of the watermark file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn read(&self) -> Result<Option<Watermark>, StateError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let trimmed = contents.trim_end();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(Watermark::new(trimmed)))
    }

    async fn write(&self, path: &str) -> Result<(), StateError> {
        let write_err = |source: std::io::Error| StateError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Write-then-rename so a crash leaves either the old or the new value.
        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).await.map_err(write_err)?;
        file.write_all(path.as_bytes()).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);
        fs::rename(&temp, &self.path).await.map_err(write_err)?;

        tracing::trace!(watermark = path, file = %self.path.display(), "watermark advanced");
        Ok(())
    }
}
