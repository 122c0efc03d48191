use std::future::Future;
use std::time::Duration;

use super::PolicyFailure;

/// Bounds a single attempt to a fixed duration.
///
/// On expiry the inner future is dropped, which cancels it at its next await
/// point, and the attempt resolves as [`PolicyFailure::Timeout`]. Work that keeps
/// running on another task is not stopped, but its result is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutGuard {
    duration: Duration,
}

impl TimeoutGuard {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn run<F, T, E>(&self, work: F) -> Result<T, PolicyFailure>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<PolicyFailure>,
    {
        match tokio::time::timeout(self.duration, work).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.duration.as_millis() as u64,
                    "Attempt timed out"
                );
                Err(PolicyFailure::Timeout {
                    after: self.duration,
                })
            }
        }
    }
}
