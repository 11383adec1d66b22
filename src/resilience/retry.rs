//! Bounded exponential-backoff retry for transient failures.

use crate::errors::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Runs `f` until it succeeds, fails non-transiently, or the attempt
    /// budget runs out. Delay doubles between attempts, capped at
    /// `max_delay`.
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                // The final attempt's error passes through unchanged.
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        error = %err,
                        "transient failure, backing off {delay:?}"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
