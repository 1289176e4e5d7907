//! Exponential backoff for transient failures.
//!
//! The delay before retry `n` (0-based) is `delay * backoff^n`, so the
//! default policy waits 1s, 2s, 4s between its four attempts. A single wait
//! never exceeds [`MAX_DELAY`]. Which errors are transient is up to the caller.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

/// Upper bound for one backoff wait.
pub const MAX_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Multiplier applied to the delay after every retry.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(1000),
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Sleep before retry number `retry` (0 is the first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff.powi(retry.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor)
            .map_or(MAX_DELAY, |d| d.min(MAX_DELAY))
    }
}

/// Run `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the policy's retries are used up. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let total_t0 = Instant::now();
    let mut retry = 0u32;

    loop {
        let attempt_t0 = Instant::now();
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }
                if retry >= policy.max_retries {
                    error!(
                        attempts = retry + 1,
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(e);
                }

                let delay = policy.delay_for(retry);
                warn!(
                    attempt = retry + 1,
                    max_retries = policy.max_retries,
                    elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                    ?delay,
                    error = %e,
                    "Attempt failed; backing off"
                );
                sleep(delay).await;
                retry += 1;
            }
        }
    }
}
