pub mod api;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod metrics;
pub mod provider;
pub mod requests;
pub mod resilience;
pub mod responses;
pub mod router;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use cache::{CacheKey, CacheStats, CacheStore, KeyValueStore, LocalStore};
pub use crate::metrics::{AppMetrics, MetricsMiddleware};
pub use resilience::{ExecuteOptions, ExecutionError, ResilienceExecutor};
pub use services::{FlightSearchService, SearchError};
pub use state::AppState;
