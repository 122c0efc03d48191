//! Bounded retry with exponential backoff.
//!
//! # Backoff Schedule
//!
//! Attempt 1 runs immediately. Attempt `n >= 2` waits
//! `min(base_delay * multiplier^(n-2), max_delay)` first:
//!
//! | Attempt | base 200ms, x2, cap 2s |
//! |---------|------------------------|
//! | 1       | 0ms                    |
//! | 2       | 200ms                  |
//! | 3       | 400ms                  |
//! | 4       | 800ms                  |
//! | 5       | 1600ms                 |
//! | 6       | 2000ms                 |

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::PolicyFailure;
use crate::config::RetryConfig;

/// Decides whether a failed attempt may be retried
pub type RetryPredicate = Arc<dyn Fn(&PolicyFailure) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryScheduler {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    predicate: Option<RetryPredicate>,
}

impl RetryScheduler {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            predicate: None,
        }
    }

    /// Restrict retries to failures accepted by `predicate`.
    ///
    /// Without a predicate every failure is retried.
    pub fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait before attempt `attempt` (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 2).min(i32::MAX as u32) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.multiplier.powi(exponent)).min(max_ms);

        Duration::from_millis(delay_ms as u64)
    }

    /// Delays for every permitted attempt, in order
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts)
            .map(|attempt| self.delay_for_attempt(attempt))
            .collect()
    }

    fn is_retryable(&self, failure: &PolicyFailure) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(failure),
            None => true,
        }
    }

    /// Run `operation` until it succeeds, a failure is not retryable, or the
    /// attempt budget is spent. Attempts run strictly one after another.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, PolicyFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, PolicyFailure>>,
    {
        let mut attempt = 1;

        loop {
            let delay = self.delay_for_attempt(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let failure = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !self.is_retryable(&failure) {
                tracing::debug!(attempt, error = %failure, "Failure is not retryable");
                return Err(failure);
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    attempts = attempt,
                    error = %failure,
                    "Retry attempts exhausted"
                );
                return Err(PolicyFailure::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }

            tracing::debug!(
                attempt,
                next_delay_ms = self.delay_for_attempt(attempt + 1).as_millis() as u64,
                error = %failure,
                "Attempt failed, retrying"
            );
            attempt += 1;
        }
    }
}

impl fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}
