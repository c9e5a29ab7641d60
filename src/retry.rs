//! Retry logic with exponential backoff
//!
//! Two policies live here and they are deliberately kept apart:
//! - [`with_retry`] retries *transient* failures (engine unreachable, network
//!   hiccups) a bounded number of times with exponential backoff and jitter.
//! - [`with_rate_limit`] honors platform rate-limit signals: every
//!   [`TransportError::RateLimited`] is slept off and the same request is sent
//!   again, as long as the requested wait stays under a sane ceiling. Other
//!   transient failures inside it fall back to the bounded policy.
//!
//! Errors an engine *reports* (a failed transfer) are never retried here.
//!
//! # Example
//!
//! ```no_run
//! use fetch_relay::retry::{IsRetryable, with_retry};
//! use fetch_relay::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{EngineError, Error, TransportError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, engine briefly down) should return `true`.
/// Permanent failures (rejected request, bad response, engine-reported error) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for EngineError {
    fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Unreachable(_))
    }
}

impl IsRetryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            // Platform-side hiccups are worth another try; client errors are not
            TransportError::Rejected { code, .. } => *code >= 500,
            // Rate limits have their own, unbounded-but-capped policy
            TransportError::RateLimited(_) => false,
            TransportError::InvalidResponse(_) | TransportError::Io { .. } => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Engine(e) => e.is_retryable(),
            Error::Transport(e) => e.is_retryable(),
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::InvalidLocator(_)
            | Error::Unauthorized(_)
            | Error::ShuttingDown
            | Error::NotFound(_)
            | Error::Job(_)
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result, the first non-retryable error, or the last
/// error once `config.max_attempts` retries are used up.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Execute a transport request, sleeping off every rate-limit signal
///
/// Each [`TransportError::RateLimited`] is honored by sleeping for exactly the
/// requested duration and re-issuing the same request; repeats are honored
/// every time. A requested wait above `max_wait` is returned as an error
/// instead of being slept. Transient network failures are retried with the
/// bounded `config` policy; rate-limit waits do not consume those attempts.
pub async fn with_rate_limit<F, Fut, T>(
    config: &RetryConfig,
    max_wait: Duration,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut rate_limits = 0u32;
    loop {
        let outcome = with_retry(config, &mut operation).await;
        match outcome {
            Err(TransportError::RateLimited(wait)) if wait <= max_wait => {
                rate_limits += 1;
                tracing::warn!(
                    wait_secs = wait.as_secs(),
                    rate_limits,
                    "Transport rate limited, backing off"
                );
                tokio::time::sleep(wait).await;
            }
            Err(TransportError::RateLimited(wait)) => {
                tracing::error!(
                    wait_secs = wait.as_secs(),
                    max_wait_secs = max_wait.as_secs(),
                    "Transport asked for a backoff longer than allowed, giving up"
                );
                return Err(TransportError::RateLimited(wait));
            }
            other => return other,
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
