//! Flight data provider
//!
//! [`FlightProvider`] abstracts the upstream offer source. The only implementation,
//! [`HttpFlightProvider`], talks to an OAuth2-protected HTTP API: a bearer token is
//! obtained through [`CredentialManager`] and every call runs through the
//! [`ResilienceExecutor`](crate::resilience::ResilienceExecutor).

pub mod client;
pub mod credentials;

pub use client::{HttpFlightProvider, SEARCH_OPERATION};
pub use credentials::{
    CredentialError, CredentialFetcher, CredentialManager, HttpCredentialFetcher, TOKEN_OPERATION,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::resilience::{PolicyFailure, RetryPredicate};

/// Normalized flight search parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    /// IATA code of the departure airport
    pub origin: String,
    /// IATA code of the arrival airport
    pub destination: String,
    pub departure_date: NaiveDate,
    /// Absent for one-way trips
    pub return_date: Option<NaiveDate>,
    pub adults: u8,
    pub max_results: u32,
}

/// One priced offer returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FlightOffer {
    #[schema(example = "1")]
    pub id: String,
    pub price: OfferPrice,
    /// Provider itineraries, passed through untouched
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub itineraries: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OfferPrice {
    #[schema(example = "355.34")]
    pub total: String,
    #[schema(example = "EUR")]
    pub currency: String,
}

/// OAuth2 client-credentials grant response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Declared lifetime in seconds
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Failure talking to the provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        detail: Option<String>,
    },
    /// The request never produced a response
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Whether another attempt may succeed.
    ///
    /// 400 is a caller mistake and 401 is handled by refreshing the credential,
    /// so neither is retried. 429, 5xx and any other status are.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => !matches!(status, 400 | 401),
            ProviderError::Transport(_) => true,
            ProviderError::InvalidResponse(_) | ProviderError::InvalidCredential(_) => false,
        }
    }

    /// Build an [`ProviderError::Api`] from a failed response, reading the
    /// provider's error body when it has one
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let (message, detail) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.into_message(),
            Err(_) => (None, (!body.is_empty()).then_some(body)),
        };

        ProviderError::Api {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            }),
            detail,
        }
    }
}

/// Error payloads: `{"errors":[{"title","detail"}]}` from the API and
/// `{"error","error_description"}` from the token endpoint
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorItem>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    title: Option<String>,
    detail: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> (Option<String>, Option<String>) {
        match self.errors.into_iter().next() {
            Some(item) => (item.title, item.detail),
            None => (self.error, self.error_description),
        }
    }
}

/// Retry eligibility for provider calls.
///
/// Provider errors follow [`ProviderError::is_retryable`]. Credential failures are
/// not retried here since the token fetch has its own retry policy. Anything
/// else, timeouts included, is retried.
pub fn retry_predicate() -> RetryPredicate {
    Arc::new(|failure: &PolicyFailure| {
        if failure.downcast_ref::<CredentialError>().is_some() {
            return false;
        }

        match failure.downcast_ref::<ProviderError>() {
            Some(err) => err.is_retryable(),
            None => true,
        }
    })
}

/// HTTP client shared by the token fetcher and the search client
pub fn http_client() -> Result<reqwest::Client, ProviderError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()?;

    Ok(client)
}

/// Source of flight offers
#[async_trait]
pub trait FlightProvider: Send + Sync {
    /// Short provider name used in logs and keys
    fn name(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<FlightOffer>>;
}
