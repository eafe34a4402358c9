/*!
 * Retry logic with exponential backoff
 */

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// Bounded retry with exponential backoff for per-chunk operations
///
/// Transient errors are absorbed up to `max_attempts`; non-transient errors
/// and the final failed attempt re-raise the last error unchanged.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }

    /// Execute `operation` with retry; backoff doubles after each failed
    /// attempt (`base * 2^(attempt-1)`)
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.base_backoff * 2u32.saturating_pow(attempt - 1);
                    debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
