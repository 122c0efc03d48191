//! Resilience pipeline behavior through the public API

use flight_search::config::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};
use flight_search::resilience::{
    CircuitBreaker, CircuitBreakerError, CircuitState, ExecuteOptions, FailureClass,
    PolicyFailure, ResilienceExecutor, RetryScheduler,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

fn breaker(failure_threshold: u32, cooldown_ms: u64, success_threshold: u32) -> CircuitBreaker {
    CircuitBreaker::with_config(
        "unit".to_string(),
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold,
            half_open_cooldown_ms: cooldown_ms,
            success_threshold,
        },
    )
}

async fn fail(cb: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
    cb.call(async { Err::<(), _>("boom") }).await
}

async fn succeed(cb: &CircuitBreaker) -> Result<(), CircuitBreakerError<&'static str>> {
    cb.call(async { Ok::<_, &'static str>(()) }).await
}

#[tokio::test]
async fn test_interleaved_success_resets_failure_count() {
    let cb = breaker(3, 60_000, 1);

    let _ = fail(&cb).await;
    let _ = fail(&cb).await;
    succeed(&cb).await.unwrap();
    let _ = fail(&cb).await;
    let _ = fail(&cb).await;
    assert_eq!(cb.state(), CircuitState::Closed);

    let _ = fail(&cb).await;
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_open_breaker_never_invokes_work() {
    let cb = breaker(1, 60_000, 1);
    let _ = fail(&cb).await;

    let invoked = AtomicU32::new(0);
    let result = cb
        .call(async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &'static str>(())
        })
        .await;

    assert!(matches!(result, Err(CircuitBreakerError::Open { .. })));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_half_open_needs_consecutive_probe_successes() {
    let cb = breaker(1, 50, 2);
    let _ = fail(&cb).await;
    assert_eq!(cb.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(80)).await;

    succeed(&cb).await.unwrap();
    assert_eq!(cb.state(), CircuitState::HalfOpen);
    succeed(&cb).await.unwrap();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_probe_failure_reopens_and_restarts_cooldown() {
    let cb = breaker(1, 100, 2);
    let _ = fail(&cb).await;

    tokio::time::sleep(Duration::from_millis(130)).await;
    let _ = fail(&cb).await;
    assert_eq!(cb.state(), CircuitState::Open);

    // Cooldown counts from the reopening, not the first opening
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(matches!(succeed(&cb).await, Err(CircuitBreakerError::Open { .. })));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(succeed(&cb).await.is_ok());
}

#[test]
fn test_backoff_schedule() {
    let scheduler = RetryScheduler::new(&RetryConfig {
        enabled: true,
        max_attempts: 5,
        base_delay_ms: 100,
        max_delay_ms: 300,
        multiplier: 2.0,
    });

    assert_eq!(
        scheduler.schedule(),
        vec![
            Duration::ZERO,
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(300),
            Duration::from_millis(300),
        ]
    );
}

fn fast_config() -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    config.timeout.duration_ms = 100;
    config.retry.base_delay_ms = 20;
    config.retry.max_delay_ms = 40;
    config
}

#[tokio::test]
async fn test_executor_waits_between_attempts() {
    let executor = ResilienceExecutor::new(fast_config());
    let calls = AtomicU32::new(0);

    let started = Instant::now();
    let err = executor
        .execute("slow.backoff", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow::anyhow!("unavailable"))
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(20 + 40));
    assert_eq!(err.classification, FailureClass::RetryExhausted);
    assert_eq!(err.attempts, Some(3));
    assert_eq!(err.source.root().to_string(), "unavailable");
}

#[tokio::test]
async fn test_each_attempt_gets_its_own_timeout() {
    let executor = ResilienceExecutor::new(fast_config());
    let calls = AtomicU32::new(0);

    let value = executor
        .execute("slow.first", || async {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt == 1 {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            Ok::<_, anyhow::Error>(attempt)
        })
        .await
        .unwrap();

    assert_eq!(value, 2);
}

#[tokio::test]
async fn test_single_timeout_is_classified() {
    let mut config = fast_config();
    config.retry.enabled = false;
    let executor = ResilienceExecutor::new(config);

    let err = executor
        .execute("slow.once", || async {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .unwrap_err();

    assert_eq!(err.classification, FailureClass::Timeout);
    assert!(matches!(err.source, PolicyFailure::Timeout { .. }));
}

#[tokio::test]
async fn test_predicate_stops_retrying_client_errors() {
    let executor = ResilienceExecutor::new(fast_config());
    let calls = AtomicU32::new(0);
    let options = ExecuteOptions::new().with_retry_predicate(Arc::new(|failure: &PolicyFailure| {
        !failure.root().to_string().contains("400")
    }));

    let err = executor
        .execute_with(
            "client.error",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("provider returned 400"))
            },
            options,
        )
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.classification, FailureClass::Unknown);
}

#[tokio::test]
async fn test_open_circuit_is_reported_per_operation() {
    let mut config = fast_config();
    config.retry.enabled = false;
    config.circuit_breaker.failure_threshold = 2;
    let executor = ResilienceExecutor::new(config);

    for _ in 0..2 {
        let _ = executor
            .execute("flaky", || async { Err::<(), _>(anyhow::anyhow!("down")) })
            .await;
    }

    let err = executor
        .execute("flaky", || async { Ok::<_, anyhow::Error>(()) })
        .await
        .unwrap_err();
    assert_eq!(err.classification, FailureClass::CircuitOpen);
    assert_eq!(executor.circuit_state("flaky"), Some(CircuitState::Open));

    executor
        .execute("healthy", || async { Ok::<_, anyhow::Error>(()) })
        .await
        .unwrap();
    assert_eq!(executor.circuit_state("healthy"), Some(CircuitState::Closed));
}
