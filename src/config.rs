use std::path::PathBuf;
use std::time::Duration;

use crate::cli::SyncArgs;
use crate::download::DownloadConfig;
use crate::retry::RetryConfig;
use crate::types::{FailurePolicy, LogLevel};

/// Application configuration, validated from [`SyncArgs`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub directory: PathBuf,
    pub state_directory: PathBuf,
    pub retry: RetryConfig,
    pub failure_policy: FailurePolicy,
    pub log_level: LogLevel,
    pub dry_run: bool,
    pub no_progress_bar: bool,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl SyncConfig {
    pub fn from_args(args: SyncArgs) -> anyhow::Result<Self> {
        if args.directory.trim().is_empty() {
            anyhow::bail!("--directory must not be empty");
        }
        if args.max_attempts == 0 {
            anyhow::bail!("--max-attempts must be at least 1");
        }

        let directory = expand_tilde(&args.directory);
        // The original tool kept its watermark next to the downloads.
        let state_directory = args
            .state_directory
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| directory.clone());

        Ok(Self {
            directory,
            state_directory,
            retry: RetryConfig {
                max_attempts: args.max_attempts,
                delay: Duration::from_secs(args.retry_delay),
            },
            failure_policy: args.on_failure,
            log_level: args.log_level,
            dry_run: args.dry_run,
            no_progress_bar: args.no_progress_bar,
        })
    }

    /// Subset of the configuration consumed by the download engine.
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            directory: self.directory.clone(),
            retry: self.retry,
            failure_policy: self.failure_policy,
            dry_run: self.dry_run,
            no_progress_bar: self.no_progress_bar,
        }
    }
}
