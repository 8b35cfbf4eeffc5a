use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::fs;
use tokio_util::sync::CancellationToken;

use super::error::DownloadError;
use crate::catalog::{CatalogError, MediaCatalog, MediaEntry};
use crate::retry::{self, RetryAction, RetryConfig, RetryError};
use crate::state::WatermarkStore;

const MIB: f64 = 1_048_576.0;

/// Result of a single successful [`Downloader::download_one`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Bytes were transferred. `elapsed` covers the successful attempt only.
    Downloaded { bytes: u64, elapsed: Duration },
    /// A file with the same name was already in the destination directory.
    AlreadyPresent,
}

/// Downloads camera files one at a time into a flat destination directory
/// and advances the watermark after each completed file.
pub struct Downloader {
    catalog: Arc<dyn MediaCatalog>,
    watermark: Arc<dyn WatermarkStore>,
    directory: PathBuf,
    retry: RetryConfig,
    watermark_held: AtomicBool,
}

impl Downloader {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        watermark: Arc<dyn WatermarkStore>,
        directory: PathBuf,
        retry: RetryConfig,
    ) -> Self {
        Self {
            catalog,
            watermark,
            directory,
            retry,
            watermark_held: AtomicBool::new(false),
        }
    }

    /// Stop advancing the watermark for the rest of this downloader's life.
    ///
    /// Used once a file in the batch has failed: later files may still be
    /// fetched, but the watermark must not move past the failed one.
    pub fn hold_watermark(&self) {
        self.watermark_held.store(true, Ordering::SeqCst);
    }

    pub fn is_watermark_held(&self) -> bool {
        self.watermark_held.load(Ordering::SeqCst)
    }

    /// Local path for `entry`: the destination directory plus the remote
    /// filename. The camera folder is dropped.
    pub fn local_path(&self, entry: &MediaEntry) -> Result<PathBuf, DownloadError> {
        let filename = entry.filename();
        if filename.is_empty() || filename == "." || filename == ".." || filename.contains('\\') {
            return Err(DownloadError::InvalidPath(entry.path.clone()));
        }
        Ok(self.directory.join(filename))
    }

    /// Download one entry.
    ///
    /// 1. Skip if the local file already exists.
    /// 2. Fetch metadata (not retried).
    /// 3. Transfer into a `.part` file, retrying connection errors with a
    ///    fixed delay.
    /// 4. Move the `.part` file into place, stamp its times with the capture
    ///    time, and advance the watermark.
    ///
    /// On any failure after the transfer starts the `.part` file is removed,
    /// so the final path only ever holds complete files.
    pub async fn download_one(
        &self,
        entry: &MediaEntry,
        cancel: &CancellationToken,
    ) -> Result<EntryOutcome, DownloadError> {
        let target = self.local_path(entry)?;

        if fs::try_exists(&target).await? {
            tracing::debug!(path = %entry.path, local = %target.display(), "already present, skipping");
            self.commit(entry).await?;
            return Ok(EntryOutcome::AlreadyPresent);
        }

        let metadata = self
            .catalog
            .media_metadata(&entry.path)
            .await
            .map_err(|source| DownloadError::Metadata {
                path: entry.path.clone(),
                source,
            })?;

        tracing::info!(
            "Downloading {} ({} bytes, captured {})",
            entry.path,
            metadata.size_bytes,
            metadata
                .created()
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| metadata.creation_timestamp.to_string()),
        );

        fs::create_dir_all(&self.directory).await?;
        let part_path = part_path_for(&target);

        let transferred = retry::retry_with_delay(
            &self.retry,
            cancel,
            |e: &CatalogError| {
                if e.is_transient() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || async {
                let started = Instant::now();
                self.catalog
                    .download(&entry.path, &part_path)
                    .await
                    .map(|()| started.elapsed())
            },
        )
        .await;

        let elapsed = match transferred {
            Ok(elapsed) => elapsed,
            Err(err) => {
                discard_partial(&part_path).await;
                return Err(match err {
                    RetryError::Aborted(source) => DownloadError::Transfer {
                        path: entry.path.clone(),
                        source,
                    },
                    RetryError::Exhausted { attempts, last } => DownloadError::RetriesExhausted {
                        path: entry.path.clone(),
                        attempts,
                        last_error: last.to_string(),
                    },
                    RetryError::Cancelled { attempts, last } => DownloadError::Cancelled {
                        path: entry.path.clone(),
                        attempts,
                        last_error: last.to_string(),
                    },
                });
            }
        };

        if let Err(e) = fs::rename(&part_path, &target).await {
            discard_partial(&part_path).await;
            return Err(DownloadError::Disk(e));
        }

        let times_path = target.clone();
        let ts = metadata.creation_timestamp;
        let stamped = tokio::task::spawn_blocking(move || set_file_times(&times_path, ts))
            .await
            .map_err(|e| DownloadError::Disk(std::io::Error::other(e)))?;
        if let Err(e) = stamped {
            tracing::warn!("Could not set file times on {}: {}", target.display(), e);
        }

        tracing::info!(
            "Download complete in {:.1}s {:.2} MiB/s",
            elapsed.as_secs_f64(),
            throughput_mib_per_sec(metadata.size_bytes, elapsed),
        );

        self.commit(entry).await?;

        Ok(EntryOutcome::Downloaded {
            bytes: metadata.size_bytes,
            elapsed,
        })
    }

    async fn commit(&self, entry: &MediaEntry) -> Result<(), DownloadError> {
        if self.is_watermark_held() {
            tracing::debug!(path = %entry.path, "watermark held after earlier failure");
            return Ok(());
        }
        self.watermark.write(&entry.path).await?;
        Ok(())
    }
}

/// Throughput in MiB/s, or 0 when no measurable time passed.
pub fn throughput_mib_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / MIB / secs
    } else {
        0.0
    }
}

fn part_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

async fn discard_partial(part_path: &Path) {
    match fs::remove_file(part_path).await {
        Ok(()) => tracing::debug!("Removed partial file {}", part_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Could not remove partial file {}: {}",
            part_path.display(),
            e
        ),
    }
}

/// Set the modification and access times of a file to the given Unix
/// timestamp.
///
/// Negative timestamps (dates before 1970) are applied when the platform can
/// represent them and clamp to the epoch otherwise.
fn set_file_times(path: &Path, timestamp: i64) -> std::io::Result<()> {
    let time = if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(timestamp.unsigned_abs()))
            .unwrap_or(SystemTime::UNIX_EPOCH)
    };
    let times = FileTimes::new().set_modified(time).set_accessed(time);
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(times)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FileWatermarkStore, Watermark};
    use crate::test_support::{FailKind, FakeCatalog};

    struct Fixture {
        _dir: tempfile::TempDir,
        dest: PathBuf,
        catalog: Arc<FakeCatalog>,
        store: Arc<FileWatermarkStore>,
        downloader: Downloader,
    }

    fn fixture(catalog: FakeCatalog, retry: RetryConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("media");
        let catalog = Arc::new(catalog);
        let store = Arc::new(FileWatermarkStore::new(&dir.path().join("state")));
        let downloader = Downloader::new(catalog.clone(), store.clone(), dest.clone(), retry);
        Fixture {
            _dir: dir,
            dest,
            catalog,
            store,
            downloader,
        }
    }

    fn quick_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    async fn watermark(f: &Fixture) -> Option<Watermark> {
        f.store.read().await.unwrap()
    }

    const CLIP: &str = "100GOPRO/GX010001.MP4";

    #[tokio::test]
    async fn test_downloads_new_file() {
        let f = fixture(
            FakeCatalog::new(&[CLIP]).with_metadata(CLIP, 1_600_000_000, 26),
            quick_retry(3),
        );
        let outcome = f
            .downloader
            .download_one(&MediaEntry::new(CLIP), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, EntryOutcome::Downloaded { bytes: 26, .. }));
        let local = f.dest.join("GX010001.MP4");
        // Check times before reading the file back, which may touch atime.
        let meta = std::fs::metadata(&local).unwrap();
        assert_eq!(
            meta.modified().unwrap(),
            UNIX_EPOCH + Duration::from_secs(1_600_000_000)
        );
        assert_eq!(
            meta.accessed().unwrap(),
            UNIX_EPOCH + Duration::from_secs(1_600_000_000)
        );
        assert_eq!(std::fs::read(&local).unwrap(), FakeCatalog::content(CLIP));
        assert!(!f.dest.join("GX010001.MP4.part").exists());
        assert_eq!(watermark(&f).await, Some(Watermark::new(CLIP)));
        assert_eq!(f.catalog.download_calls(), vec![CLIP.to_string()]);
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped_and_watermark_advances() {
        let f = fixture(FakeCatalog::new(&[CLIP]), quick_retry(3));
        std::fs::create_dir_all(&f.dest).unwrap();
        std::fs::write(f.dest.join("GX010001.MP4"), b"already here").unwrap();

        let outcome = f
            .downloader
            .download_one(&MediaEntry::new(CLIP), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, EntryOutcome::AlreadyPresent);
        assert!(f.catalog.download_calls().is_empty());
        assert_eq!(f.catalog.metadata_calls(), 0);
        assert_eq!(
            std::fs::read(f.dest.join("GX010001.MP4")).unwrap(),
            b"already here"
        );
        assert_eq!(watermark(&f).await, Some(Watermark::new(CLIP)));
    }

    #[tokio::test]
    async fn test_held_watermark_is_not_advanced() {
        let f = fixture(FakeCatalog::new(&[CLIP]), quick_retry(3));
        f.downloader.hold_watermark();
        f.downloader
            .download_one(&MediaEntry::new(CLIP), &CancellationToken::new())
            .await
            .unwrap();
        assert!(f.dest.join("GX010001.MP4").exists());
        assert_eq!(watermark(&f).await, None);
    }

    #[tokio::test]
    async fn test_metadata_failure_is_not_retried() {
        let f = fixture(FakeCatalog::new(&[CLIP]).fail_metadata(CLIP), quick_retry(5));
        let err = f
            .downloader
            .download_one(&MediaEntry::new(CLIP), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Metadata { .. }));
        assert_eq!(f.catalog.metadata_calls(), 1);
        assert!(f.catalog.download_calls().is_empty());
        assert_eq!(watermark(&f).await, None);
    }

    #[tokio::test]
    async fn test_transient_failures_recovered() {
        let f = fixture(
            FakeCatalog::new(&[CLIP]).fail_transfers(CLIP, FailKind::Connection, 2),
            quick_retry(5),
        );
        let outcome = f
            .downloader
            .download_one(&MediaEntry::new(CLIP), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, EntryOutcome::Downloaded { .. }));
        assert_eq!(f.catalog.download_calls().len(), 3);
        assert_eq!(
            std::fs::read(f.dest.join("GX010001.MP4")).unwrap(),
            FakeCatalog::content(CLIP)
        );
        assert_eq!(watermark(&f).await, Some(Watermark::new(CLIP)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_exhausts_bounded_attempts() {
        let retry = RetryConfig {
            max_attempts: 4,
            delay: Duration::from_secs(2),
        };
        let f = fixture(
            FakeCatalog::new(&[CLIP]).fail_transfers(CLIP, FailKind::Connection, u32::MAX),
            retry,
        );
        let started = tokio::time::Instant::now();
        let err = f
            .downloader
            .download_one(&MediaEntry::new(CLIP), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            DownloadError::RetriesExhausted { attempts, ref path, .. } => {
                assert_eq!(attempts, 4);
                assert_eq!(path, CLIP);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(f.catalog.download_calls().len(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
        // The partial bytes the camera left behind are gone.
        assert!(!f.dest.join("GX010001.MP4.part").exists());
        assert!(!f.dest.join("GX010001.MP4").exists());
        assert_eq!(watermark(&f).await, None);
    }

    #[tokio::test]
    async fn test_non_transient_transfer_failure_not_retried() {
        let f = fixture(
            FakeCatalog::new(&[CLIP]).fail_transfers(CLIP, FailKind::Device, 1),
            quick_retry(5),
        );
        let err = f
            .downloader
            .download_one(&MediaEntry::new(CLIP), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Transfer { .. }));
        assert_eq!(f.catalog.download_calls().len(), 1);
        assert!(!f.dest.join("GX010001.MP4").exists());
        assert_eq!(watermark(&f).await, None);
    }

    #[tokio::test]
    async fn test_cancel_stops_retrying() {
        let f = fixture(
            FakeCatalog::new(&[CLIP]).fail_transfers(CLIP, FailKind::Connection, u32::MAX),
            quick_retry(10),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = f
            .downloader
            .download_one(&MediaEntry::new(CLIP), &cancel)
            .await
            .unwrap_err();

        // The attempt that was already allowed to start runs; no retry follows.
        assert!(matches!(err, DownloadError::Cancelled { attempts: 1, .. }));
        assert_eq!(f.catalog.download_calls().len(), 1);
        assert!(!f.dest.join("GX010001.MP4.part").exists());
    }

    #[tokio::test]
    async fn test_invalid_paths_rejected() {
        let f = fixture(FakeCatalog::new(&[]), quick_retry(1));
        for path in ["100GOPRO/", "100GOPRO/..", ".", ""] {
            let err = f
                .downloader
                .download_one(&MediaEntry::new(path), &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, DownloadError::InvalidPath(_)), "{path:?}");
        }
        assert!(f.catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_folder_is_discarded_in_local_name() {
        let f = fixture(FakeCatalog::new(&[]), quick_retry(1));
        assert_eq!(
            f.downloader
                .local_path(&MediaEntry::new("101GOPRO/GOPR0042.JPG"))
                .unwrap(),
            f.dest.join("GOPR0042.JPG")
        );
    }

    #[test]
    fn test_part_path_for() {
        assert_eq!(
            part_path_for(Path::new("/media/GX010001.MP4")),
            PathBuf::from("/media/GX010001.MP4.part")
        );
    }

    #[test]
    fn test_throughput() {
        assert_eq!(throughput_mib_per_sec(10 * 1_048_576, Duration::from_secs(2)), 5.0);
        assert_eq!(throughput_mib_per_sec(1_048_576, Duration::ZERO), 0.0);
    }

    fn tmp_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, b"test").unwrap();
        p
    }

    #[test]
    fn test_set_file_times_positive_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let p = tmp_file(&dir, "pos.txt");
        set_file_times(&p, 1_700_000_000).unwrap();
        let mtime = std::fs::metadata(&p).unwrap().modified().unwrap();
        assert_eq!(mtime, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    }

    #[test]
    fn test_set_file_times_zero_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let p = tmp_file(&dir, "zero.txt");
        set_file_times(&p, 0).unwrap();
        let mtime = std::fs::metadata(&p).unwrap().modified().unwrap();
        assert_eq!(mtime, UNIX_EPOCH);
    }

    #[test]
    fn test_set_file_times_negative_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let p = tmp_file(&dir, "neg.txt");
        // Should not panic
        set_file_times(&p, -86400).unwrap();
    }

    #[test]
    fn test_set_file_times_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(set_file_times(&dir.path().join("missing.txt"), 0).is_err());
    }
}
