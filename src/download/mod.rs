//! Sync engine: list the camera, plan against the watermark, then download
//! the new files one at a time with turbo transfer enabled for the batch.

pub mod error;
pub mod file;
pub mod report;
pub mod turbo;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogError, MediaCatalog, MediaEntry};
use crate::plan;
use crate::retry::RetryConfig;
use crate::state::{StateError, WatermarkStore};
use crate::types::FailurePolicy;

pub use error::DownloadError;
pub use file::{Downloader, EntryOutcome};
pub use report::{EntryFailure, SyncReport};
pub use turbo::{with_performance_mode, Bracketed, PerformanceMode};

/// Subset of application config consumed by the sync engine.
/// Decoupled from CLI parsing so the engine can be tested independently.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub directory: PathBuf,
    pub retry: RetryConfig,
    pub failure_policy: FailurePolicy,
    pub dry_run: bool,
    pub no_progress_bar: bool,
}

/// Failures that end a pass before any file is attempted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to list media on camera: {0}")]
    Catalog(#[source] CatalogError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Where a sync pass is. Only the watermark survives between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Listing,
    Planning,
    PerformanceModeOn,
    /// 1-based position in the plan.
    Transferring {
        index: usize,
        total: usize,
    },
    PerformanceModeOff,
    Done,
}

impl SyncPhase {
    pub fn can_advance_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        match (self, next) {
            (Idle, Listing) | (Listing, Planning) => true,
            // Empty plan, dry run, or cancelled before the batch.
            (Planning, PerformanceModeOn) | (Planning, Done) => true,
            (PerformanceModeOn, Transferring { index: 1, .. }) => true,
            (PerformanceModeOn, PerformanceModeOff) => true,
            (Transferring { index, total }, Transferring { index: n, total: t }) => {
                t == total && n == index + 1 && n <= t
            }
            (Transferring { .. }, PerformanceModeOff) => true,
            (PerformanceModeOff, Done) => true,
            _ => false,
        }
    }
}

struct PhaseTracker {
    phase: SyncPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Idle,
        }
    }

    fn advance(&mut self, next: SyncPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal sync phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        tracing::debug!(from = ?self.phase, to = ?next, "sync phase");
        self.phase = next;
    }
}

/// Create a progress bar with a consistent template.
///
/// Returns `ProgressBar::hidden()` when the user passed `--no-progress-bar` or
/// stdout is not a TTY (e.g. piped output, cron jobs).
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    match ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("=> ")),
        Err(e) => tracing::debug!("Invalid progress template: {}", e),
    }
    pb
}

/// Runs sync passes for one camera into one destination directory.
pub struct Syncer {
    catalog: Arc<dyn MediaCatalog>,
    watermark: Arc<dyn WatermarkStore>,
    config: DownloadConfig,
}

impl Syncer {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        watermark: Arc<dyn WatermarkStore>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            catalog,
            watermark,
            config,
        }
    }

    /// Download every camera file newer than the watermark.
    ///
    /// Listing and watermark-read failures end the pass with an error. Per-file
    /// failures are collected in the report and handled according to the
    /// configured [`FailurePolicy`]. When `shutdown_token` is cancelled the
    /// pass stops before the next file (or the next retry) and returns what it
    /// has done so far.
    pub async fn download_all_new(
        &self,
        shutdown_token: CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(self.config.failure_policy, self.config.dry_run);
        let mut phase = PhaseTracker::new();

        phase.advance(SyncPhase::Listing);
        let catalog = self.catalog.list_media().await.map_err(SyncError::Catalog)?;
        report.catalog_total = catalog.len();

        phase.advance(SyncPhase::Planning);
        let watermark = self.watermark.read().await?;
        match &watermark {
            Some(mark) => tracing::debug!(watermark = %mark, "resuming after watermark"),
            None => tracing::debug!("no watermark, first sync"),
        }
        let planned = plan::plan(catalog, watermark.as_ref());
        report.planned = planned.len();

        if self.config.dry_run {
            for entry in &planned {
                tracing::info!("[DRY RUN] Would download {}", entry.path);
            }
            return Ok(self.finish(report, &mut phase));
        }

        tracing::info!(
            "Downloading latest {} of {} on camera.",
            planned.len(),
            report.catalog_total
        );
        if planned.is_empty() {
            return Ok(self.finish(report, &mut phase));
        }
        if shutdown_token.is_cancelled() {
            tracing::info!("Shutdown requested, not starting downloads");
            report.cancelled = true;
            report.not_attempted = planned.len();
            return Ok(self.finish(report, &mut phase));
        }

        phase.advance(SyncPhase::PerformanceModeOn);
        let downloader = Downloader::new(
            self.catalog.clone(),
            self.watermark.clone(),
            self.config.directory.clone(),
            self.config.retry,
        );
        let batch =
            self.transfer_batch(&planned, &downloader, &shutdown_token, &mut report, &mut phase);
        let bracketed = with_performance_mode(self.catalog.clone(), || batch).await;

        phase.advance(SyncPhase::PerformanceModeOff);
        if let Some(e) = bracketed.enable_error {
            report.performance_mode_errors.push(format!("enable: {e}"));
        }
        if let Some(e) = bracketed.disable_error {
            report.performance_mode_errors.push(format!("disable: {e}"));
        }

        Ok(self.finish(report, &mut phase))
    }

    fn finish(&self, mut report: SyncReport, phase: &mut PhaseTracker) -> SyncReport {
        phase.advance(SyncPhase::Done);
        report.finished_at = Some(Utc::now());
        report.log_summary();
        report
    }

    /// Download `planned` strictly in order, one transfer at a time.
    async fn transfer_batch(
        &self,
        planned: &[MediaEntry],
        downloader: &Downloader,
        shutdown_token: &CancellationToken,
        report: &mut SyncReport,
        phase: &mut PhaseTracker,
    ) {
        let total = planned.len();
        let pb = create_progress_bar(self.config.no_progress_bar, total as u64);

        for (i, entry) in planned.iter().enumerate() {
            if shutdown_token.is_cancelled() {
                pb.suspend(|| tracing::info!("Shutdown requested, stopping before {}", entry.path));
                report.cancelled = true;
                report.not_attempted = total - i;
                break;
            }

            phase.advance(SyncPhase::Transferring { index: i + 1, total });
            pb.set_message(entry.filename().to_string());

            let result = downloader.download_one(entry, shutdown_token).await;
            pb.inc(1);

            let err = match result {
                Ok(EntryOutcome::Downloaded { bytes, elapsed }) => {
                    report.downloaded += 1;
                    report.bytes_transferred += bytes;
                    report.transfer_time += elapsed;
                    continue;
                }
                Ok(EntryOutcome::AlreadyPresent) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => e,
            };

            pb.suspend(|| tracing::error!("Download failed: {}: {}", entry.path, err));
            // Later files may still land on disk, but the watermark stays
            // below this one so the next pass plans it again.
            downloader.hold_watermark();
            let cancelled = matches!(err, DownloadError::Cancelled { .. });
            report.failures.push(EntryFailure {
                path: entry.path.clone(),
                error: err.to_string(),
            });

            if cancelled || self.config.failure_policy == FailurePolicy::Abort {
                report.cancelled |= cancelled;
                report.not_attempted = total - i - 1;
                if !cancelled {
                    pb.suspend(|| {
                        tracing::warn!(
                            "Aborting batch, {} files not attempted",
                            report.not_attempted
                        )
                    });
                }
                break;
            }
        }

        pb.finish_and_clear();
    }
}
