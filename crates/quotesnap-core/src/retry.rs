//! Retry logic with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use crate::source::SourceError;

/// Backoff strategy for retrying failed batch calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is `min(base * factor^attempt, max)` plus a random extra in `[0, jitter]`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// Upper bound of the deterministic part of the delay.
        max: Duration,
        /// Upper bound of the random extra added on top.
        jitter: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(600),
            factor: 2.0,
            max: Duration::from_secs(6),
            jitter: Duration::from_millis(800),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let jitter_ms = jitter.as_millis() as u64;
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    fastrand::u64(0..=jitter_ms)
                };

                Duration::from_secs_f64(seconds) + Duration::from_millis(extra)
            }
        }
    }
}

/// Configuration for the per-batch retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per batch, including the first one.
    pub max_attempts: u32,
    /// The backoff strategy to use between attempts.
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with fixed backoff.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or the attempt
    /// budget is spent. The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, SourceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if !error.retryable() || attempt >= attempts => return Err(error),
                Err(error) => {
                    let delay = self.delay_for_attempt(attempt - 1);
                    tracing::debug!(
                        "{label} attempt {attempt}/{attempts} failed: {error}; sleeping {:.1}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
