pub mod middleware;

pub use middleware::MetricsMiddleware;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};

use crate::resilience::{CircuitState, TransitionListener};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Process-wide Prometheus recorder.
///
/// The recorder is installed once; every `AppMetrics` shares its handle. The
/// resilience and cache layers emit through the `metrics` macros directly, so
/// they are captured as soon as any `AppMetrics` exists.
#[derive(Clone)]
pub struct AppMetrics {
    prometheus_handle: Arc<PrometheusHandle>,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self::with_config(None)
    }

    pub fn with_config(config: Option<&crate::config::AppConfig>) -> Self {
        let handle = PROMETHEUS_HANDLE.get_or_init(|| {
            let builder = PrometheusBuilder::new();

            let builder = if let Some(cfg) = config {
                builder
                    .add_global_label("service", cfg.app.name.clone())
                    .add_global_label("version", cfg.app.version.clone())
                    .add_global_label("environment", cfg.app.environment.clone())
            } else {
                builder
            };

            let builder = builder
                .set_buckets_for_metric(
                    Matcher::Full("http_requests_duration_seconds".to_string()),
                    &[0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0],
                )
                .expect("Failed to set buckets for http_requests_duration_seconds")
                .set_buckets_for_metric(
                    Matcher::Full("resilience_execution_duration_seconds".to_string()),
                    &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
                )
                .expect("Failed to set buckets for resilience_execution_duration_seconds");

            Self::describe_metrics();

            builder
                .install_recorder()
                .expect("Failed to install Prometheus recorder")
        });

        Self {
            prometheus_handle: Arc::new(handle.clone()),
        }
    }

    fn describe_metrics() {
        // HTTP metrics
        describe_counter!("http_requests_total", "Total number of HTTP requests");
        describe_histogram!(
            "http_requests_duration_seconds",
            "HTTP request duration in seconds"
        );
        describe_gauge!(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed"
        );

        // Resilience metrics
        describe_counter!(
            "resilience_executions_total",
            "Executions through the resilience pipeline by operation and outcome"
        );
        describe_histogram!(
            "resilience_execution_duration_seconds",
            "Wall time of resilience executions, retries included"
        );
        describe_counter!(
            "circuit_breaker_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_gauge!(
            "circuit_breaker_state",
            "Current breaker state per operation: 0 closed, 1 half-open, 2 open"
        );

        // Cache metrics
        describe_counter!("cache_hits_total", "Total number of cache hits");
        describe_counter!("cache_misses_total", "Total number of cache misses");
    }

    // HTTP metrics
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            "http_requests_duration_seconds",
            "method" => method.to_string(),
            "path" => path.to_string()
        )
        .record(duration_secs);
    }

    pub fn http_request_start(&self) {
        gauge!("http_requests_in_flight").increment(1.0);
    }

    pub fn http_request_end(&self) {
        gauge!("http_requests_in_flight").decrement(1.0);
    }

    // Resilience metrics
    pub fn record_circuit_transition(&self, operation: &str, from: CircuitState, to: CircuitState) {
        counter!(
            "circuit_breaker_transitions_total",
            "operation" => operation.to_string(),
            "from" => from.to_string(),
            "to" => to.to_string()
        )
        .increment(1);

        let value = match to {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        };
        gauge!("circuit_breaker_state", "operation" => operation.to_string()).set(value);
    }

    /// Breaker transition listener feeding these metrics
    pub fn transition_listener(&self) -> TransitionListener {
        let metrics = self.clone();
        Arc::new(move |operation: &str, from: CircuitState, to: CircuitState| {
            metrics.record_circuit_transition(operation, from, to)
        })
    }

    // Prometheus export
    pub fn render(&self) -> String {
        self.prometheus_handle.render()
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}
