use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::cache::{CacheKey, CacheStats, CacheStore, TtlError, TtlSelector};
use crate::provider::{CredentialError, FlightOffer, FlightProvider, ProviderError, SearchQuery};
use crate::resilience::{ExecutionError, FailureClass, PolicyFailure};

/// Why a search could not be answered
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Dates(#[from] TtlError),
    /// The provider's circuit is open
    #[error("flight provider is temporarily unavailable")]
    Unavailable { operation: String },
    #[error("flight provider did not answer in time")]
    Timeout { operation: String, elapsed_ms: u64 },
    #[error("flight provider request failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        detail: Option<String>,
    },
}

impl SearchError {
    /// Translate a provider failure into a search outcome
    pub fn from_provider(err: anyhow::Error) -> Self {
        match err.downcast::<ExecutionError>() {
            Ok(exec) => Self::from_execution(&exec),
            Err(err) => match err.downcast_ref::<ProviderError>() {
                Some(provider) => Self::from_provider_error(provider),
                None => SearchError::Upstream {
                    status: None,
                    message: err.to_string(),
                    detail: None,
                },
            },
        }
    }

    fn from_execution(exec: &ExecutionError) -> Self {
        match exec.source.root() {
            PolicyFailure::CircuitOpen { .. } => SearchError::Unavailable {
                operation: exec.operation.clone(),
            },
            PolicyFailure::Timeout { .. } => SearchError::Timeout {
                operation: exec.operation.clone(),
                elapsed_ms: exec.elapsed_ms,
            },
            PolicyFailure::Operation(inner) => {
                if let Some(CredentialError::Fetch(token_exec)) = inner.downcast_ref::<CredentialError>() {
                    return Self::from_execution(token_exec);
                }
                match inner.downcast_ref::<ProviderError>() {
                    Some(provider) => Self::from_provider_error(provider),
                    None => SearchError::Upstream {
                        status: None,
                        message: format!("{:#}", inner),
                        detail: None,
                    },
                }
            }
            PolicyFailure::RetryExhausted { .. } => SearchError::Upstream {
                status: None,
                message: exec.to_string(),
                detail: None,
            },
        }
    }

    fn from_provider_error(err: &ProviderError) -> Self {
        match err {
            ProviderError::Api {
                status,
                message,
                detail,
            } => SearchError::Upstream {
                status: Some(*status),
                message: message.clone(),
                detail: detail.clone(),
            },
            other => SearchError::Upstream {
                status: None,
                message: other.to_string(),
                detail: None,
            },
        }
    }

    /// Resilience classification behind this error, when there is one
    pub fn classification(&self) -> Option<FailureClass> {
        match self {
            SearchError::Unavailable { .. } => Some(FailureClass::CircuitOpen),
            SearchError::Timeout { .. } => Some(FailureClass::Timeout),
            _ => None,
        }
    }
}

/// Cache-aside flight search: results are cached per query with an expiry that
/// shrinks as departure approaches.
pub struct FlightSearchService {
    provider: Arc<dyn FlightProvider>,
    cache: CacheStore,
}

impl FlightSearchService {
    pub fn new(provider: Arc<dyn FlightProvider>, cache: CacheStore) -> Self {
        Self { provider, cache }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<FlightOffer>, SearchError> {
        self.search_on(query, Utc::now().date_naive()).await
    }

    /// Search as of `today`
    #[tracing::instrument(
        skip(self, query),
        fields(origin = %query.origin, destination = %query.destination, departure = %query.departure_date)
    )]
    pub async fn search_on(
        &self,
        query: &SearchQuery,
        today: NaiveDate,
    ) -> Result<Vec<FlightOffer>, SearchError> {
        let bucket = TtlSelector::select(query.departure_date, query.return_date, today)?;
        let key = CacheKey::flight_search(query);
        tracing::debug!(cache_key = %key, bucket = %bucket, "Resolved search cache entry");

        let provider = &self.provider;
        self.cache
            .wrap(&key, bucket.as_secs(), move || async move {
                provider
                    .search(query)
                    .await
                    .map_err(SearchError::from_provider)
            })
            .await
    }

    /// Drop every cached search departing from `origin`
    pub async fn invalidate_origin(&self, origin: &str) -> u64 {
        let pattern = CacheKey::flight_search_origin_pattern(origin);
        let deleted = self.cache.delete_by_pattern(&pattern).await;
        tracing::info!(origin, deleted, "Invalidated cached searches");
        deleted
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
