use tracing_subscriber::EnvFilter;

use crate::types::LogLevel;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init(level: LogLevel) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str())),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}
