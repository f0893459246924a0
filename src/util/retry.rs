//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::ParleyError;

/// Retry policy for idempotent backend calls (reachability checks, model listing).
///
/// Streaming requests are never retried: a half-delivered reply cannot be
/// replayed without duplicating text.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Run `operation`, retrying errors that report themselves retryable.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ParleyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ParleyError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() || attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "retrying after error"
                    );
                    tokio::time::sleep(jittered(backoff)).await;
                    backoff = backoff.mul_f64(self.multiplier).min(self.max_backoff);
                    attempt += 1;
                }
            }
        }
    }
}

/// 75%–125% of `base`.
fn jittered(base: Duration) -> Duration {
    let sample = (uuid::Uuid::new_v4().as_u128() % 10_000) as f64 / 10_000.0;
    base.mul_f64(0.75 + sample * 0.5)
}
