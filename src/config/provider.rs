use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};

/// External flight provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, also used in credential cache keys
    #[serde(default = "default_name")]
    pub name: String,
    /// Base URL of the provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the OAuth2 token endpoint
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// Path of the flight offers search endpoint
    #[serde(default = "default_search_path")]
    pub search_path: String,
    /// OAuth2 client id (set via environment variable)
    #[serde(default)]
    pub client_id: String,
    /// OAuth2 client secret (set via environment variable)
    #[serde(default)]
    pub client_secret: String,
    /// Fraction of the declared token lifetime the token stays cached
    #[serde(default = "default_token_ttl_fraction")]
    pub token_ttl_fraction: f64,
}

fn default_name() -> String {
    "amadeus".to_string()
}

fn default_base_url() -> String {
    "https://test.api.amadeus.com".to_string()
}

fn default_token_path() -> String {
    "/v1/security/oauth2/token".to_string()
}

fn default_search_path() -> String {
    "/v2/shopping/flight-offers".to_string()
}

fn default_token_ttl_fraction() -> f64 {
    0.9
}

impl ProviderConfig {
    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.token_path)
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.search_path)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_url: default_base_url(),
            token_path: default_token_path(),
            search_path: default_search_path(),
            client_id: String::new(),
            client_secret: String::new(),
            token_ttl_fraction: default_token_ttl_fraction(),
        }
    }
}

impl Validate for ProviderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError("provider.name cannot be empty".to_string()));
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::ValidationError("provider.base_url cannot be empty".to_string()));
        }
        if !(self.token_ttl_fraction > 0.0 && self.token_ttl_fraction < 1.0) {
            return Err(ConfigError::ValidationError("provider.token_ttl_fraction must be within (0, 1)".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for ProviderConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
