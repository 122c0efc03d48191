pub mod app;
pub mod cache;
pub mod provider;
pub mod resilience;

pub use app::{AppConfig, AppMetadata, ObservabilityConfig, ServerConfig};
pub use cache::{CacheBackend, CacheConfig};
pub use provider::ProviderConfig;
pub use resilience::{CircuitBreakerConfig, ResilienceConfig, RetryConfig, TimeoutConfig};

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    /// A value was loaded but is not acceptable
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Configuration sections check their own invariants after loading
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Configuration sections that can be built without any source
pub trait WithDefaults {
    fn with_defaults() -> Self;
}

/// Load the application configuration from files and environment variables
pub fn load() -> Result<AppConfig, ConfigError> {
    app::load_config()
}
