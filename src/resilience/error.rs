use std::fmt;
use std::time::Duration;

/// Failure produced by a composed policy pipeline
#[derive(Debug, thiserror::Error)]
pub enum PolicyFailure {
    /// A single attempt exceeded its time budget
    #[error("attempt timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },
    /// The circuit breaker rejected the call without running it
    #[error("circuit breaker is open for {name}")]
    CircuitOpen { name: String },
    /// Every permitted attempt failed; only the last failure is kept
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<PolicyFailure>,
    },
    /// The wrapped work itself failed
    #[error(transparent)]
    Operation(#[from] anyhow::Error),
}

impl PolicyFailure {
    /// The underlying failure, looking through retry exhaustion
    pub fn root(&self) -> &PolicyFailure {
        match self {
            PolicyFailure::RetryExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Downcast the work's own error, if that is what ultimately failed
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self.root() {
            PolicyFailure::Operation(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyFailure::CircuitOpen { .. })
    }

    pub fn classify(&self) -> FailureClass {
        match self {
            PolicyFailure::CircuitOpen { .. } => FailureClass::CircuitOpen,
            PolicyFailure::Timeout { .. } => FailureClass::Timeout,
            PolicyFailure::RetryExhausted { .. } => FailureClass::RetryExhausted,
            PolicyFailure::Operation(_) => FailureClass::Unknown,
        }
    }
}

/// Coarse classification attached to every executor failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    CircuitOpen,
    Timeout,
    RetryExhausted,
    Unknown,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::CircuitOpen => "circuit_open",
            FailureClass::Timeout => "timeout",
            FailureClass::RetryExhausted => "retry_exhausted",
            FailureClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure surfaced by [`ResilienceExecutor`](super::ResilienceExecutor), enriched
/// with the classification, elapsed time and attempt count of the call
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed ({classification}) after {elapsed_ms}ms: {source}")]
pub struct ExecutionError {
    pub operation: String,
    pub classification: FailureClass,
    pub elapsed_ms: u64,
    /// Number of attempts made, known when retries were exhausted
    pub attempts: Option<u32>,
    #[source]
    pub source: PolicyFailure,
}

impl ExecutionError {
    pub fn new(operation: &str, source: PolicyFailure, elapsed: Duration) -> Self {
        let attempts = match &source {
            PolicyFailure::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        };

        Self {
            operation: operation.to_string(),
            classification: source.classify(),
            elapsed_ms: elapsed.as_millis() as u64,
            attempts,
            source,
        }
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source.downcast_ref::<E>()
    }
}
