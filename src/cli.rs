use clap::Parser;

use crate::types::{FailurePolicy, LogLevel};

/// Command-line options for a sync run.
///
/// Usable on its own or flattened into a larger command with
/// `#[command(flatten)]`.
#[derive(Parser, Debug, Clone)]
#[command(name = "gopro-sync", about = "Download new media from a GoPro camera")]
pub struct SyncArgs {
    /// Local directory for downloaded media
    #[arg(short = 'd', long, env = "GOPRO_SYNC_DIRECTORY", default_value = ".download")]
    pub directory: String,

    /// Directory holding the sync watermark (default: the download directory)
    #[arg(long, env = "GOPRO_SYNC_STATE_DIRECTORY")]
    pub state_directory: Option<String>,

    /// Total attempts per file on connection errors, including the first
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 2)]
    pub retry_delay: u64,

    /// What to do after a file fails for good
    #[arg(long, value_enum, default_value = "abort")]
    pub on_failure: FailurePolicy,

    /// List the files that would be downloaded without transferring anything
    #[arg(long)]
    pub dry_run: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}
