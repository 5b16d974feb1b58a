//! Bounded exponential backoff shared by backend and embedding calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry budget for transient failures: two retries with exponential
/// backoff unless callers override it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Run `operation`, retrying while `retryable` approves the error and the
/// policy's budget lasts. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    stage: &'static str,
    retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !retryable(&err) {
                    return Err(err);
                }
                warn!(stage = stage, attempt = attempt + 1, reason = %err, "retrying after transient failure");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}
