use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::{AccessToken, ProviderError};
use crate::cache::{CacheKey, CacheStore};
use crate::config::{CacheConfig, ProviderConfig};
use crate::resilience::{ExecutionError, ResilienceExecutor};

/// Operation key of the token fetch
pub const TOKEN_OPERATION: &str = "provider.auth.token";

/// Obtains a fresh bearer credential from the provider
#[async_trait]
pub trait CredentialFetcher: Send + Sync + fmt::Debug {
    async fn fetch(&self) -> Result<AccessToken, ProviderError>;
}

/// OAuth2 client-credentials grant over HTTP
#[derive(Clone)]
pub struct HttpCredentialFetcher {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpCredentialFetcher {
    pub fn new(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

impl fmt::Debug for HttpCredentialFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCredentialFetcher")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialFetcher for HttpCredentialFetcher {
    #[tracing::instrument(skip(self), fields(token_url = %self.token_url))]
    async fn fetch(&self) -> Result<AccessToken, ProviderError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(response).await);
        }

        response
            .json::<AccessToken>()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to obtain provider credential: {0}")]
    Fetch(#[from] ExecutionError),
    #[error(transparent)]
    Invalid(ProviderError),
}

/// Caches the provider's bearer token and refreshes it through the resilience
/// pipeline when it is missing.
///
/// Authorization failures are detected by the caller, which invalidates the token
/// and tries once more.
pub struct CredentialManager {
    provider: String,
    cache: CacheStore,
    executor: Arc<ResilienceExecutor>,
    fetcher: Arc<dyn CredentialFetcher>,
    ttl_fraction: f64,
    max_ttl_secs: u64,
}

impl CredentialManager {
    pub fn new(
        provider: &ProviderConfig,
        cache_config: &CacheConfig,
        cache: CacheStore,
        executor: Arc<ResilienceExecutor>,
        fetcher: Arc<dyn CredentialFetcher>,
    ) -> Self {
        Self {
            provider: provider.name.clone(),
            cache,
            executor,
            fetcher,
            ttl_fraction: provider.token_ttl_fraction,
            max_ttl_secs: cache_config.credential_ttl_secs,
        }
    }

    fn cache_key(&self) -> String {
        CacheKey::credential(&self.provider)
    }

    /// Seconds to keep a token declared valid for `expires_in` seconds.
    /// Always below `expires_in`; zero means do not cache.
    pub fn cache_ttl(&self, expires_in: u64) -> u64 {
        let scaled = (expires_in as f64 * self.ttl_fraction).floor() as u64;
        scaled.min(self.max_ttl_secs).min(expires_in.saturating_sub(1))
    }

    #[tracing::instrument(skip(self), fields(provider = %self.provider))]
    pub async fn get_access_token(&self) -> Result<String, CredentialError> {
        let key = self.cache_key();
        if let Some(token) = self.cache.get::<String>(&key).await {
            tracing::debug!("Using cached provider credential");
            return Ok(token);
        }

        let fetcher = &self.fetcher;
        let token = self
            .executor
            .execute(TOKEN_OPERATION, move || async move {
                Ok::<_, anyhow::Error>(fetcher.fetch().await?)
            })
            .await?;

        if token.access_token.trim().is_empty() {
            return Err(CredentialError::Invalid(ProviderError::InvalidCredential(
                "token endpoint returned an empty access token".to_string(),
            )));
        }
        if token.expires_in <= 0 {
            return Err(CredentialError::Invalid(ProviderError::InvalidCredential(format!(
                "token endpoint returned a non-positive expiry of {}s",
                token.expires_in
            ))));
        }

        let ttl = self.cache_ttl(token.expires_in as u64);
        if ttl == 0 {
            tracing::warn!(
                expires_in = token.expires_in,
                "Provider credential lifetime too short to cache"
            );
        } else {
            self.cache.set(&key, &token.access_token, ttl).await;
        }

        tracing::info!(
            token_type = %token.token_type,
            expires_in = token.expires_in,
            ttl_secs = ttl,
            "Fetched provider credential"
        );
        Ok(token.access_token)
    }

    /// Drop the cached token so the next call fetches a new one
    #[tracing::instrument(skip(self), fields(provider = %self.provider))]
    pub async fn invalidate_token(&self) {
        let removed = self.cache.delete(&self.cache_key()).await;
        tracing::info!(removed, "Invalidated provider credential");
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("provider", &self.provider)
            .field("fetcher", &self.fetcher)
            .field("ttl_fraction", &self.ttl_fraction)
            .field("max_ttl_secs", &self.max_ttl_secs)
            .finish_non_exhaustive()
    }
}
