use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::file::throughput_mib_per_sec;
use crate::types::FailurePolicy;

/// A file that failed for good during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    pub path: String,
    pub error: String,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Files the camera listed.
    pub catalog_total: usize,
    /// Files newer than the watermark.
    pub planned: usize,
    pub downloaded: usize,
    /// Planned files already present on disk.
    pub skipped: usize,
    pub failures: Vec<EntryFailure>,
    /// Planned files never started because the batch aborted or was cancelled.
    pub not_attempted: usize,
    pub bytes_transferred: u64,
    /// Time spent in successful transfers.
    #[serde(serialize_with = "serialize_secs")]
    pub transfer_time: Duration,
    pub failure_policy: FailurePolicy,
    pub dry_run: bool,
    pub cancelled: bool,
    /// Turbo transfer toggle failures. Secondary to `failures`.
    pub performance_mode_errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl SyncReport {
    pub(crate) fn new(failure_policy: FailurePolicy, dry_run: bool) -> Self {
        Self {
            catalog_total: 0,
            planned: 0,
            downloaded: 0,
            skipped: 0,
            failures: Vec::new(),
            not_attempted: 0,
            bytes_transferred: 0,
            transfer_time: Duration::ZERO,
            failure_policy,
            dry_run,
            cancelled: false,
            performance_mode_errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when every planned file is on disk and nothing was interrupted.
    /// Toggle failures alone do not make a pass unsuccessful.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.not_attempted == 0 && !self.cancelled
    }

    /// The error to surface for this pass: the first file failure, or a
    /// toggle failure only when every file went through.
    pub fn primary_error(&self) -> Option<String> {
        if let Some(first) = self.failures.first() {
            return Some(format!("{}: {}", first.path, first.error));
        }
        self.performance_mode_errors.first().cloned()
    }

    /// Average throughput over successful transfers, MiB/s.
    pub fn throughput_mib_per_sec(&self) -> f64 {
        throughput_mib_per_sec(self.bytes_transferred, self.transfer_time)
    }

    pub fn log_summary(&self) {
        if self.dry_run {
            tracing::info!("── Dry Run Summary ──");
            tracing::info!(
                "  {} of {} files on camera would be downloaded",
                self.planned,
                self.catalog_total
            );
            return;
        }

        tracing::info!("── Summary ──");
        tracing::info!(
            "  {} downloaded, {} already present, {} failed, {} not attempted, {} planned",
            self.downloaded,
            self.skipped,
            self.failed(),
            self.not_attempted,
            self.planned
        );
        if self.bytes_transferred > 0 {
            tracing::info!(
                "  {} bytes in {:.1}s ({:.2} MiB/s)",
                self.bytes_transferred,
                self.transfer_time.as_secs_f64(),
                self.throughput_mib_per_sec()
            );
        }
        if self.cancelled {
            tracing::info!("  Interrupted by shutdown request");
        }
        for failure in &self.failures {
            tracing::error!("Download failed: {}: {}", failure.path, failure.error);
        }
        for err in &self.performance_mode_errors {
            tracing::warn!("Turbo transfer: {}", err);
        }
    }
}
