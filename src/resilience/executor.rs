use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::{
    CircuitBreaker, CircuitState, ComposedPolicy, ExecutionError, PolicyComposer, RetryPredicate,
    TransitionListener,
};
use crate::config::{CircuitBreakerConfig, ResilienceConfig, RetryConfig, TimeoutConfig};

/// Per-call overrides for [`ResilienceExecutor::execute_with`].
///
/// Any override makes the executor build a private policy for that call only.
/// The operation's shared breaker is still used unless `circuit_breaker` is
/// overridden, in which case the call gets a fresh breaker of its own.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub timeout: Option<TimeoutConfig>,
    pub retry: Option<RetryConfig>,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub retry_predicate: Option<RetryPredicate>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    pub fn with_retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("has_retry_predicate", &self.retry_predicate.is_some())
            .finish()
    }
}

/// Bounded map of composed policies, evicting the oldest insertion when full
#[derive(Debug)]
struct PolicyCache {
    capacity: usize,
    entries: HashMap<String, ComposedPolicy>,
    order: VecDeque<String>,
}

impl PolicyCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<ComposedPolicy> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: &str, policy: ComposedPolicy) -> Option<String> {
        let mut evicted = None;

        if !self.entries.contains_key(key) {
            if self.entries.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                    evicted = Some(oldest);
                }
            }
            self.order.push_back(key.to_string());
        }

        self.entries.insert(key.to_string(), policy);
        evicted
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Runs work through composed resilience policies addressed by operation key.
///
/// Breakers are created lazily per key and live as long as the executor, so
/// evicting a cached policy never loses failure history.
pub struct ResilienceExecutor {
    config: ResilienceConfig,
    breakers: DashMap<String, CircuitBreaker>,
    policies: Mutex<PolicyCache>,
    listener: Option<TransitionListener>,
}

impl ResilienceExecutor {
    pub fn new(config: ResilienceConfig) -> Self {
        let policies = Mutex::new(PolicyCache::new(config.policy_cache_capacity));

        Self {
            config,
            breakers: DashMap::new(),
            policies,
            listener: None,
        }
    }

    /// Report breaker transitions of every operation to `listener`
    pub fn with_transition_listener(mut self, listener: TransitionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// State of the breaker guarding `operation`, if one has been created
    pub fn circuit_state(&self, operation: &str) -> Option<CircuitState> {
        self.breakers.get(operation).map(|breaker| breaker.state())
    }

    /// Number of policies currently held in the cache
    pub fn cached_policies(&self) -> usize {
        self.lock_policies().len()
    }

    fn lock_policies(&self) -> MutexGuard<'_, PolicyCache> {
        self.policies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_breaker(&self, operation: &str, config: CircuitBreakerConfig) -> CircuitBreaker {
        let breaker = CircuitBreaker::with_config(operation.to_string(), config);
        match &self.listener {
            Some(listener) => breaker.with_listener(listener.clone()),
            None => breaker,
        }
    }

    fn shared_breaker(&self, operation: &str) -> CircuitBreaker {
        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| self.new_breaker(operation, self.config.circuit_breaker.clone()))
            .clone()
    }

    fn cached_policy(&self, operation: &str) -> ComposedPolicy {
        if let Some(policy) = self.lock_policies().get(operation) {
            return policy;
        }

        let policy =
            PolicyComposer::new(&self.config).compose(Some(self.shared_breaker(operation)), None);

        if let Some(evicted) = self.lock_policies().insert(operation, policy.clone()) {
            tracing::debug!(operation, evicted = %evicted, "Evicted cached resilience policy");
        }

        policy
    }

    fn transient_policy(&self, operation: &str, options: ExecuteOptions) -> ComposedPolicy {
        let mut config = self.config.clone();
        if let Some(timeout) = options.timeout {
            config.timeout = timeout;
        }
        if let Some(retry) = options.retry {
            config.retry = retry;
        }

        let breaker = match options.circuit_breaker {
            Some(circuit_breaker) => {
                config.circuit_breaker = circuit_breaker.clone();
                self.new_breaker(operation, circuit_breaker)
            }
            None => self.shared_breaker(operation),
        };

        PolicyComposer::new(&config).compose(Some(breaker), options.retry_predicate)
    }

    /// Run `work` through the cached policy for `operation`
    pub async fn execute<F, Fut, T>(&self, operation: &str, work: F) -> Result<T, ExecutionError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        let policy = self.cached_policy(operation);
        self.run(operation, &policy, work).await
    }

    /// Run `work` through a policy built for this call only
    pub async fn execute_with<F, Fut, T>(
        &self,
        operation: &str,
        work: F,
        options: ExecuteOptions,
    ) -> Result<T, ExecutionError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        let policy = self.transient_policy(operation, options);
        self.run(operation, &policy, work).await
    }

    /// Run `work`, handing any failure to `fallback`. An error returned by the
    /// fallback is propagated as is.
    pub async fn execute_or_fallback<F, Fut, T, FB, FbFut>(
        &self,
        operation: &str,
        work: F,
        fallback: FB,
        options: Option<ExecuteOptions>,
    ) -> anyhow::Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
        FB: FnOnce(ExecutionError) -> FbFut + Send,
        FbFut: Future<Output = anyhow::Result<T>> + Send,
    {
        let result = match options {
            Some(options) => self.execute_with(operation, work, options).await,
            None => self.execute(operation, work).await,
        };

        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::info!(
                    operation,
                    classification = %err.classification,
                    "Invoking fallback"
                );
                fallback(err).await
            }
        }
    }

    async fn run<F, Fut, T>(
        &self,
        operation: &str,
        policy: &ComposedPolicy,
        work: F,
    ) -> Result<T, ExecutionError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let result = policy.execute(work).await;
        let elapsed = started.elapsed();

        metrics::histogram!(
            "resilience_execution_duration_seconds",
            "operation" => operation.to_string()
        )
        .record(elapsed.as_secs_f64());

        match result {
            Ok(value) => {
                metrics::counter!(
                    "resilience_executions_total",
                    "operation" => operation.to_string(),
                    "outcome" => "success"
                )
                .increment(1);
                tracing::debug!(
                    operation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Operation succeeded"
                );
                Ok(value)
            }
            Err(failure) => {
                let err = ExecutionError::new(operation, failure, elapsed);
                metrics::counter!(
                    "resilience_executions_total",
                    "operation" => operation.to_string(),
                    "outcome" => err.classification.as_str()
                )
                .increment(1);
                tracing::warn!(
                    operation,
                    classification = %err.classification,
                    elapsed_ms = err.elapsed_ms,
                    attempts = ?err.attempts,
                    error = %err.source,
                    "Operation failed"
                );
                Err(err)
            }
        }
    }
}

impl fmt::Debug for ResilienceExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceExecutor")
            .field("config", &self.config)
            .field("breakers", &self.breakers.len())
            .field("cached_policies", &self.cached_policies())
            .finish()
    }
}
