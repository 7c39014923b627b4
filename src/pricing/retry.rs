//! Bounded retry with linear backoff

use crate::config::RetryConfig;
use crate::Result;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently a source call is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,
    /// Wait after the first failure; later waits grow linearly
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the attempt following failure number `failure` (1-based)
    pub fn delay_after(&self, failure: u32) -> Duration {
        self.base_delay * failure
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }
}

/// Runs `operation` until it succeeds or the policy is exhausted
///
/// After failure `i` the call waits `base_delay * i` before trying again.
/// Errors that cannot succeed on a second try (see
/// `PriceError::is_retryable`) are returned immediately.
///
/// # Arguments
///
/// * `policy` - Attempt bound and backoff
/// * `label` - Name used in log lines (usually the source name)
/// * `operation` - Produces a fresh future for every attempt
///
/// # Returns
///
/// The first success, or the last attempt's error unchanged.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt >= policy.max_attempts => {
                if attempt > 1 {
                    tracing::debug!("{}: giving up after {} attempts", label, attempt);
                }
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    "{}: attempt {}/{} failed: {}; retrying in {:?}",
                    label,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
