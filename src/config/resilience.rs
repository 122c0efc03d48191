use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ConfigError, Validate, WithDefaults};

/// Resilience configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Per-attempt timeout
    #[serde(default = "TimeoutConfig::default")]
    pub timeout: TimeoutConfig,
    /// Retry configuration
    #[serde(default = "RetryConfig::default")]
    pub retry: RetryConfig,
    /// Circuit breaker configuration
    #[serde(default = "CircuitBreakerConfig::default")]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Maximum number of composed policies kept by the executor
    #[serde(default = "default_policy_cache_capacity")]
    pub policy_cache_capacity: usize,
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Enable the per-attempt timeout
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum duration of one attempt in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub duration_ms: u64,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Enable retry
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds
    #[serde(default = "default_retry_base_delay")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Enable circuit breaker
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Number of consecutive failures before opening the circuit
    #[serde(default = "default_circuit_breaker_threshold")]
    pub failure_threshold: u32,
    /// Milliseconds an open circuit waits before admitting a probe
    #[serde(default = "default_circuit_breaker_cooldown")]
    pub half_open_cooldown_ms: u64,
    /// Number of consecutive probe successes needed to close the circuit
    #[serde(default = "default_circuit_breaker_success_threshold")]
    pub success_threshold: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_policy_cache_capacity() -> usize {
    100
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    200
}

fn default_retry_max_delay() -> u64 {
    2_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_cooldown() -> u64 {
    30_000
}

fn default_circuit_breaker_success_threshold() -> u32 {
    2
}

impl TimeoutConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn half_open_cooldown(&self) -> Duration {
        Duration::from_millis(self.half_open_cooldown_ms)
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            policy_cache_capacity: default_policy_cache_capacity(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            duration_ms: default_timeout_ms(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay(),
            max_delay_ms: default_retry_max_delay(),
            multiplier: default_retry_multiplier(),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            failure_threshold: default_circuit_breaker_threshold(),
            half_open_cooldown_ms: default_circuit_breaker_cooldown(),
            success_threshold: default_circuit_breaker_success_threshold(),
        }
    }
}

impl Validate for ResilienceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.timeout.validate()?;
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        if self.policy_cache_capacity == 0 {
            return Err(ConfigError::ValidationError("resilience.policy_cache_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Validate for TimeoutConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.duration_ms == 0 {
            return Err(ConfigError::ValidationError("resilience.timeout.duration_ms must be > 0 when timeout is enabled".to_string()));
        }
        Ok(())
    }
}

impl Validate for CircuitBreakerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.failure_threshold == 0 {
            return Err(ConfigError::ValidationError("resilience.circuit_breaker.failure_threshold must be > 0 when circuit breaker is enabled".to_string()));
        }
        if self.enabled && self.half_open_cooldown_ms == 0 {
            return Err(ConfigError::ValidationError("resilience.circuit_breaker.half_open_cooldown_ms must be > 0 when circuit breaker is enabled".to_string()));
        }
        if self.enabled && self.success_threshold == 0 {
            return Err(ConfigError::ValidationError("resilience.circuit_breaker.success_threshold must be > 0 when circuit breaker is enabled".to_string()));
        }
        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.max_attempts == 0 {
            return Err(ConfigError::ValidationError("resilience.retry.max_attempts must be > 0 when retry is enabled".to_string()));
        }
        if self.enabled && self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::ValidationError("resilience.retry.base_delay_ms must be <= max_delay_ms".to_string()));
        }
        if self.enabled && self.multiplier < 1.0 {
            return Err(ConfigError::ValidationError("resilience.retry.multiplier must be >= 1.0 when retry is enabled".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for ResilienceConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
