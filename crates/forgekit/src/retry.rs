//! Caller-side retry policy.
//!
//! The reconciler never retries on its own. Callers that want to ride out
//! rate limits wrap whole operations with [`with_retry`].

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::platform::{ProviderError, short_error_message};

/// Initial backoff delay.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;
/// Backoff ceiling.
pub const MAX_BACKOFF_MS: u64 = 60_000;
/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: usize,
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Errors worth retrying: rate limits and transport hiccups.
///
/// Cancellation, NotFound, validation and auth failures are final.
pub fn is_retryable(err: &ProviderError) -> bool {
    err.is_rate_limited() || err.is_transport()
}

/// Run `operation`, retrying with exponential backoff while `should_retry`
/// accepts the error.
///
/// `label` names the operation in retry logs.
pub async fn with_retry<T, E, F, Fut, ShouldRetry>(
    config: RetryConfig,
    label: &str,
    mut operation: F,
    should_retry: ShouldRetry,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
    ShouldRetry: Fn(&E) -> bool,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.into_backoff())
        .notify(|err, dur| {
            tracing::warn!(
                "{} failed, retrying in {:?} (attempt {}): {}",
                label,
                dur,
                attempt.load(Ordering::SeqCst),
                short_error_message(err)
            );
        })
        .when(should_retry)
        .await
}
