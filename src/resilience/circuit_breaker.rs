//! Circuit Breaker Pattern Implementation
//!
//! The circuit breaker monitors consecutive failures of one logical operation and
//! temporarily rejects calls to it, giving the dependency time to recover.
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐
//! │ Closed  │ ◄──────────────────┐
//! │ (Normal)│                    │
//! └────┬────┘                    │
//!      │ failure_threshold       │ success_threshold
//!      │ consecutive failures    │ consecutive probe successes
//!      ▼                         │
//! ┌─────────┐   cooldown    ┌────┴──────┐
//! │  Open   │───────────────► HalfOpen  │
//! │(Failing)│  (next call)  │ (Probing) │
//! └─────────┘◄──────────────└───────────┘
//!                any failure
//! ```
//!
//! The Open → HalfOpen transition is lazy: it happens on the first call after the
//! cooldown has elapsed, and that call becomes the probe. While a probe is in
//! flight other calls are rejected.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, allowing all requests through
    Closed,
    /// Failing state, rejecting all requests until the cooldown expires
    Open,
    /// Testing state, admitting one probe at a time
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Observer notified with `(name, from, to)` on every state change
pub type TransitionListener = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

/// Lifetime totals, kept outside the state lock
#[derive(Debug, Default)]
struct CircuitBreakerStats {
    total_calls: AtomicU64,
    total_failures: AtomicU64,
}

impl CircuitBreakerStats {
    fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct BreakerState {
    status: CircuitState,
    consecutive_failures: u32,
    consecutive_half_open_successes: u32,
    opened_at: Option<Instant>,
    probe_started_at: Option<Instant>,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            status: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_half_open_successes: 0,
            opened_at: None,
            probe_started_at: None,
        }
    }

    fn reset_counters(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_half_open_successes = 0;
        self.probe_started_at = None;
    }
}

/// Circuit breaker error
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the operation was not invoked
    #[error("Circuit breaker is open for {name}")]
    Open { name: String },
    /// The underlying operation failed
    #[error("Operation failed: {0}")]
    Inner(#[source] E),
}

/// Failure-accumulation gate for one logical operation.
///
/// Clones share the same state, so a breaker can be handed to several composed
/// policies while still counting failures once per operation key.
#[derive(Clone)]
pub struct CircuitBreaker {
    /// Name for logging and debugging
    name: String,
    state: Arc<Mutex<BreakerState>>,
    stats: Arc<CircuitBreakerStats>,
    config: CircuitBreakerConfig,
    listener: Option<TransitionListener>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration
    pub fn new(name: String) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration
    pub fn with_config(name: String, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(BreakerState::closed())),
            stats: Arc::new(CircuitBreakerStats::default()),
            config,
            listener: None,
        }
    }

    /// Attach a transition observer. Used for diagnostics only.
    pub fn with_listener(mut self, listener: TransitionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the current state of the circuit breaker
    pub fn state(&self) -> CircuitState {
        self.lock().status
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn total_calls(&self) -> u64 {
        self.stats.total_calls.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.stats.total_failures.load(Ordering::Relaxed)
    }

    /// Get failure rate (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            return 0.0;
        }
        self.total_failures() as f64 / total as f64
    }

    /// Execute an operation protected by the circuit breaker
    ///
    /// # State Transitions
    ///
    /// - **Closed → Open**: when consecutive failures reach `failure_threshold`
    /// - **Open → HalfOpen**: on the first call after `half_open_cooldown_ms`
    /// - **HalfOpen → Closed**: after `success_threshold` consecutive probe successes
    /// - **HalfOpen → Open**: on any probe failure, restarting the cooldown
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let admitted_as = self.admit()?;

        match f.await {
            Ok(value) => {
                self.on_success(admitted_as);
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    fn admit<E>(&self) -> Result<CircuitState, CircuitBreakerError<E>> {
        let cooldown = self.config.half_open_cooldown();
        let mut state = self.lock();
        let status = state.status;

        match status {
            CircuitState::Closed => Ok(CircuitState::Closed),
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map(|opened| opened.elapsed())
                    .unwrap_or(Duration::MAX);

                if elapsed < cooldown {
                    return Err(CircuitBreakerError::Open {
                        name: self.name.clone(),
                    });
                }

                state.status = CircuitState::HalfOpen;
                state.reset_counters();
                state.probe_started_at = Some(Instant::now());
                drop(state);

                tracing::info!(
                    circuit_breaker = %self.name,
                    state = "Open -> HalfOpen",
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Circuit breaker admitting probe"
                );
                self.notify(CircuitState::Open, CircuitState::HalfOpen);
                Ok(CircuitState::HalfOpen)
            }
            CircuitState::HalfOpen => {
                // A probe that never reported back (e.g. cancelled) stops
                // blocking once a full cooldown has passed.
                let probe_busy = state
                    .probe_started_at
                    .is_some_and(|started| started.elapsed() < cooldown);

                if probe_busy {
                    return Err(CircuitBreakerError::Open {
                        name: self.name.clone(),
                    });
                }

                state.probe_started_at = Some(Instant::now());
                Ok(CircuitState::HalfOpen)
            }
        }
    }

    fn on_success(&self, admitted_as: CircuitState) {
        self.stats.record_success();
        let mut state = self.lock();
        let status = state.status;

        match status {
            CircuitState::Closed => state.consecutive_failures = 0,
            CircuitState::HalfOpen if admitted_as == CircuitState::HalfOpen => {
                state.probe_started_at = None;
                state.consecutive_half_open_successes += 1;

                if state.consecutive_half_open_successes >= self.config.success_threshold {
                    let successes = state.consecutive_half_open_successes;
                    state.status = CircuitState::Closed;
                    state.opened_at = None;
                    state.reset_counters();
                    drop(state);

                    tracing::info!(
                        circuit_breaker = %self.name,
                        state = "HalfOpen -> Closed",
                        consecutive_successes = successes,
                        "Circuit breaker closed after successful recovery"
                    );
                    self.notify(CircuitState::HalfOpen, CircuitState::Closed);
                }
            }
            // A call admitted before the circuit opened finished late.
            _ => {}
        }
    }

    fn on_failure(&self) {
        self.stats.record_failure();
        let mut state = self.lock();
        let status = state.status;

        match status {
            CircuitState::Closed => {
                state.consecutive_failures += 1;

                if state.consecutive_failures >= self.config.failure_threshold {
                    let failures = state.consecutive_failures;
                    state.status = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    state.reset_counters();
                    drop(state);

                    tracing::warn!(
                        circuit_breaker = %self.name,
                        state = "Closed -> Open",
                        consecutive_failures = failures,
                        failure_threshold = self.config.failure_threshold,
                        "Circuit breaker opened due to consecutive failures"
                    );
                    self.notify(CircuitState::Closed, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                state.status = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.reset_counters();
                drop(state);

                tracing::warn!(
                    circuit_breaker = %self.name,
                    state = "HalfOpen -> Open",
                    "Circuit breaker re-opened after failed probe"
                );
                self.notify(CircuitState::HalfOpen, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        if let Some(listener) = &self.listener {
            listener(&self.name, from, to);
        }
    }

    /// Manually reset the circuit breaker to Closed state
    pub fn reset(&self) {
        let previous = {
            let mut state = self.lock();
            let previous = state.status;
            *state = BreakerState::closed();
            previous
        };

        tracing::info!(
            circuit_breaker = %self.name,
            "Circuit breaker manually reset to Closed"
        );
        if previous != CircuitState::Closed {
            self.notify(previous, CircuitState::Closed);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &state.status)
            .field("consecutive_failures", &state.consecutive_failures)
            .field(
                "consecutive_half_open_successes",
                &state.consecutive_half_open_successes,
            )
            .field("total_calls", &self.total_calls())
            .field("total_failures", &self.total_failures())
            .field("config", &self.config)
            .finish()
    }
}
