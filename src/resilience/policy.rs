use std::future::Future;

use super::{
    CircuitBreaker, CircuitBreakerError, PolicyFailure, RetryPredicate, RetryScheduler,
    TimeoutGuard,
};
use crate::config::ResilienceConfig;

/// An immutable `retry(breaker(timeout(work)))` pipeline.
///
/// Each layer is optional. Every retry attempt passes the breaker check on its
/// own and gets its own timeout.
#[derive(Debug, Clone, Default)]
pub struct ComposedPolicy {
    timeout: Option<TimeoutGuard>,
    breaker: Option<CircuitBreaker>,
    retry: Option<RetryScheduler>,
}

impl ComposedPolicy {
    pub fn timeout(&self) -> Option<&TimeoutGuard> {
        self.timeout.as_ref()
    }

    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_ref()
    }

    pub fn retry(&self) -> Option<&RetryScheduler> {
        self.retry.as_ref()
    }

    pub async fn execute<F, Fut, T>(&self, work: F) -> Result<T, PolicyFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let work = &work;

        match &self.retry {
            Some(retry) => retry.run(move |_attempt| self.attempt(work)).await,
            None => self.attempt(work).await,
        }
    }

    async fn attempt<F, Fut, T>(&self, work: &F) -> Result<T, PolicyFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let guarded = async {
            match &self.timeout {
                Some(timeout) => timeout.run(work()).await,
                None => work().await.map_err(PolicyFailure::from),
            }
        };

        match &self.breaker {
            Some(breaker) => breaker.call(guarded).await.map_err(|err| match err {
                CircuitBreakerError::Open { name } => PolicyFailure::CircuitOpen { name },
                CircuitBreakerError::Inner(failure) => failure,
            }),
            None => guarded.await,
        }
    }
}

/// Assembles [`ComposedPolicy`] values from configuration.
///
/// The composer holds no state of its own; the breaker passed to
/// [`compose`](Self::compose) decides whether failures are counted in a shared
/// or a private breaker.
#[derive(Debug, Clone, Copy)]
pub struct PolicyComposer<'a> {
    config: &'a ResilienceConfig,
}

impl<'a> PolicyComposer<'a> {
    pub fn new(config: &'a ResilienceConfig) -> Self {
        Self { config }
    }

    pub fn compose(
        &self,
        breaker: Option<CircuitBreaker>,
        predicate: Option<RetryPredicate>,
    ) -> ComposedPolicy {
        let timeout = self
            .config
            .timeout
            .enabled
            .then(|| TimeoutGuard::new(self.config.timeout.duration()));

        let breaker = breaker.filter(|_| self.config.circuit_breaker.enabled);

        let retry = self.config.retry.enabled.then(|| {
            let scheduler = RetryScheduler::new(&self.config.retry);
            match predicate {
                Some(predicate) => scheduler.with_predicate(predicate),
                None => scheduler,
            }
        });

        ComposedPolicy {
            timeout,
            breaker,
            retry,
        }
    }
}
