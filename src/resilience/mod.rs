//! Resilience patterns for calls to the flight provider
//!
//! Three primitives are composed into one pipeline per logical operation:
//!
//! - **Timeout**: bounds each attempt.
//! - **Circuit Breaker**: fails fast while a dependency is degraded.
//! - **Retry**: repeats failed attempts with exponential backoff.
//!
//! The pipeline is `retry(breaker(timeout(work)))`, so every retry attempt is
//! checked by the breaker and timed on its own.
//!
//! # Example
//!
//! ```rust
//! use flight_search::config::ResilienceConfig;
//! use flight_search::resilience::ResilienceExecutor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = ResilienceExecutor::new(ResilienceConfig::default());
//!
//! let offers = executor
//!     .execute("provider.flights.search", || async {
//!         // Your risky operation here
//!         Ok::<_, anyhow::Error>(vec!["offer-1".to_string()])
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod circuit_breaker;
mod error;
mod executor;
mod policy;
mod retry;
mod timeout;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState, TransitionListener};
pub use error::{ExecutionError, FailureClass, PolicyFailure};
pub use executor::{ExecuteOptions, ResilienceExecutor};
pub use policy::{ComposedPolicy, PolicyComposer};
pub use retry::{RetryPredicate, RetryScheduler};
pub use timeout::TimeoutGuard;
