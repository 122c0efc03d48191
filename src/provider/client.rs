use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{CredentialManager, FlightOffer, FlightProvider, ProviderError, SearchQuery};
use crate::config::ProviderConfig;
use crate::resilience::{ExecuteOptions, ExecutionError, ResilienceExecutor};

/// Operation key of the offer search
pub const SEARCH_OPERATION: &str = "provider.flights.search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<FlightOffer>,
}

/// [`FlightProvider`] backed by the provider's HTTP API
pub struct HttpFlightProvider {
    name: String,
    client: reqwest::Client,
    search_url: String,
    credentials: Arc<CredentialManager>,
    executor: Arc<ResilienceExecutor>,
}

impl HttpFlightProvider {
    pub fn new(
        client: reqwest::Client,
        config: &ProviderConfig,
        credentials: Arc<CredentialManager>,
        executor: Arc<ResilienceExecutor>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            client,
            search_url: config.search_url(),
            credentials,
            executor,
        }
    }

    /// One request with the current token
    async fn request_offers(&self, query: &SearchQuery) -> anyhow::Result<Vec<FlightOffer>> {
        let token = self.credentials.get_access_token().await?;

        let mut params = vec![
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            ("departureDate", query.departure_date.format("%Y-%m-%d").to_string()),
            ("adults", query.adults.to_string()),
            ("max", query.max_results.to_string()),
        ];
        if let Some(return_date) = query.return_date {
            params.push(("returnDate", return_date.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .client
            .get(&self.search_url)
            .bearer_auth(&token)
            .query(&params)
            .send()
            .await
            .map_err(ProviderError::from)?;

        if !response.status().is_success() {
            let err = ProviderError::from_response(response).await;
            tracing::debug!(status = ?err.status(), error = %err, "Provider rejected search");
            return Err(err.into());
        }

        let body = response
            .json::<SearchResponse>()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

        Ok(body.data)
    }

    async fn search_with_policy(&self, query: &SearchQuery) -> Result<Vec<FlightOffer>, ExecutionError> {
        let options = ExecuteOptions::new().with_retry_predicate(super::retry_predicate());

        self.executor
            .execute_with(SEARCH_OPERATION, || self.request_offers(query), options)
            .await
    }
}

fn is_unauthorized(err: &ExecutionError) -> bool {
    err.downcast_ref::<ProviderError>()
        .is_some_and(ProviderError::is_unauthorized)
}

#[async_trait]
impl FlightProvider for HttpFlightProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(
        skip(self, query),
        fields(provider = %self.name, origin = %query.origin, destination = %query.destination)
    )]
    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<FlightOffer>> {
        let offers = match self.search_with_policy(query).await {
            Ok(offers) => offers,
            Err(err) if is_unauthorized(&err) => {
                tracing::warn!("Provider rejected credential, refreshing it and retrying once");
                self.credentials.invalidate_token().await;
                self.search_with_policy(query).await?
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(offers = offers.len(), "Provider search completed");
        Ok(offers)
    }
}

impl std::fmt::Debug for HttpFlightProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFlightProvider")
            .field("name", &self.name)
            .field("search_url", &self.search_url)
            .finish_non_exhaustive()
    }
}
