//! Bounded retry policy.
//!
//! Detail-link resolution retries a fixed number of times with a fixed
//! inter-attempt delay before the engine degrades the failure to a
//! per-row error marker. The policy lives outside the reconciliation
//! loop so it can be exercised on its own.

use std::fmt;
use std::time::Duration;

use crate::models::CrawlerConfig;

/// Fixed-bound, fixed-delay retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Build the policy from the crawler config section.
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run an operation, retrying on `Err` up to the attempt bound.
    ///
    /// The operation receives the 1-based attempt number. The delay is
    /// applied between attempts, not after the last failure.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    log::warn!(
                        "Attempt {}/{} failed: {}. Retrying...",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}
