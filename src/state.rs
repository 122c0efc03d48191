//! Application wiring
//!
//! Builds the cache, resilience executor, credential manager, provider and search
//! service from an [`AppConfig`] and exposes them to actix-web as app data.

use actix_web::web::{Data, ServiceConfig};
use anyhow::Context;
use std::sync::Arc;

use crate::cache::{CacheStore, KeyValueStore, LocalStore};
use crate::config::{AppConfig, CacheBackend, CacheConfig};
use crate::metrics::AppMetrics;
use crate::provider::{self, CredentialManager, HttpCredentialFetcher, HttpFlightProvider};
use crate::resilience::ResilienceExecutor;
use crate::router;
use crate::services::FlightSearchService;

/// Shared components, cloned into every HTTP worker
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub metrics: AppMetrics,
    pub executor: Arc<ResilienceExecutor>,
    pub cache: CacheStore,
    pub credentials: Arc<CredentialManager>,
    pub search: Arc<FlightSearchService>,
}

impl AppState {
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let metrics = AppMetrics::with_config(Some(&config));

        let executor = Arc::new(
            ResilienceExecutor::new(config.resilience.clone())
                .with_transition_listener(metrics.transition_listener()),
        );

        let store = open_store(&config.cache).await?;
        let cache = CacheStore::new(store, &config.cache);

        let client = provider::http_client().context("Failed to build provider HTTP client")?;
        let fetcher = Arc::new(HttpCredentialFetcher::new(client.clone(), &config.provider));
        let credentials = Arc::new(CredentialManager::new(
            &config.provider,
            &config.cache,
            cache.clone(),
            Arc::clone(&executor),
            fetcher,
        ));
        let flight_provider = Arc::new(HttpFlightProvider::new(
            client,
            &config.provider,
            Arc::clone(&credentials),
            Arc::clone(&executor),
        ));
        let search = Arc::new(FlightSearchService::new(flight_provider, cache.clone()));

        tracing::info!(
            provider = %config.provider.name,
            base_url = %config.provider.base_url,
            cache_backend = ?config.cache.backend,
            "Application state ready"
        );

        Ok(Self {
            config,
            metrics,
            executor,
            cache,
            credentials,
            search,
        })
    }

    /// Register app data and every route
    pub fn configure(&self, app: &mut ServiceConfig) {
        app.app_data(Data::from(Arc::clone(&self.search)));
        app.app_data(Data::from(Arc::clone(&self.executor)));
        app.app_data(Data::new(self.metrics.clone()));
        router::route(app);
    }
}

async fn open_store(config: &CacheConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-process cache store");
            Ok(Arc::new(LocalStore::new()))
        }
        #[cfg(feature = "redis-cache")]
        CacheBackend::Redis => {
            let store = crate::cache::RedisStore::new(&config.redis_url, &config.prefix)
                .await
                .context("Failed to connect to Redis cache")?;
            tracing::info!(prefix = %config.prefix, "Using Redis cache store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis-cache"))]
        CacheBackend::Redis => {
            anyhow::bail!("cache.backend is redis but the redis-cache feature is not enabled")
        }
    }
}
