use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

/// Fixed-delay retry configuration.
///
/// Camera transfers fail in bursts when the USB/Wi-Fi link hiccups and
/// recover on their own, so there is no backoff: each attempt waits the same
/// `delay` after the previous one failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(2),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The classifier rejected the error; no further attempts were made.
    Aborted(E),
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
    /// Cancellation was requested before the next attempt could start.
    Cancelled { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The error returned by the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Aborted(e)
            | RetryError::Exhausted { last: e, .. }
            | RetryError::Cancelled { last: e, .. } => e,
        }
    }
}

/// Retry an async operation with a fixed delay between attempts.
///
/// - `config`: attempt bound and delay
/// - `cancel`: checked before each delay and raced against it
/// - `classifier`: inspects an error and returns `Retry` or `Abort`
/// - `operation`: the async closure to retry
///
/// An attempt that has started always runs to completion; cancellation only
/// prevents the next one.
pub async fn retry_with_delay<F, Fut, T, E, C>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    classifier: C,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };

        if classifier(&err) == RetryAction::Abort {
            return Err(RetryError::Aborted(err));
        }
        if attempt >= total_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled {
                attempts: attempt,
                last: err,
            });
        }

        tracing::warn!(
            "Retryable error (attempt {}/{}), retrying in {}s: {}",
            attempt,
            total_attempts,
            config.delay.as_secs_f64(),
            err
        );
        tokio::select! {
            _ = tokio::time::sleep(config.delay) => {}
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled {
                    attempts: attempt,
                    last: err,
                });
            }
        }
    }
}
