use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};

/// Which key-value store backs the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process store, lost on restart
    Memory,
    /// Redis server (requires the `redis-cache` feature)
    Redis,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_backend")]
    pub backend: CacheBackend,
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Key prefix for namespace isolation
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// TTL in seconds used when a caller does not pick one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Upper bound for the cached provider credential TTL in seconds
    #[serde(default = "default_credential_ttl_secs")]
    pub credential_ttl_secs: u64,
    /// Keys requested per SCAN round-trip during pattern deletes
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: usize,
    /// Keys removed per DEL round-trip during pattern deletes
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,
    /// Hard cap on keys collected by a single pattern delete
    #[serde(default = "default_max_pattern_keys")]
    pub max_pattern_keys: usize,
}

fn default_backend() -> CacheBackend {
    CacheBackend::Memory
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_prefix() -> String {
    "flight-search".to_string()
}

fn default_ttl_secs() -> u64 {
    3_600
}

fn default_credential_ttl_secs() -> u64 {
    1_500
}

fn default_scan_batch_size() -> usize {
    100
}

fn default_delete_batch_size() -> usize {
    500
}

fn default_max_pattern_keys() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: default_redis_url(),
            prefix: default_prefix(),
            default_ttl_secs: default_ttl_secs(),
            credential_ttl_secs: default_credential_ttl_secs(),
            scan_batch_size: default_scan_batch_size(),
            delete_batch_size: default_delete_batch_size(),
            max_pattern_keys: default_max_pattern_keys(),
        }
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == CacheBackend::Redis && self.redis_url.is_empty() {
            return Err(ConfigError::ValidationError("cache.redis_url cannot be empty when backend is redis".to_string()));
        }
        if self.default_ttl_secs == 0 {
            return Err(ConfigError::ValidationError("cache.default_ttl_secs must be > 0".to_string()));
        }
        if self.credential_ttl_secs == 0 {
            return Err(ConfigError::ValidationError("cache.credential_ttl_secs must be > 0".to_string()));
        }
        if self.scan_batch_size == 0 || self.delete_batch_size == 0 {
            return Err(ConfigError::ValidationError("cache batch sizes must be > 0".to_string()));
        }
        if self.max_pattern_keys == 0 {
            return Err(ConfigError::ValidationError("cache.max_pattern_keys must be > 0".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for CacheConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
