pub mod local;
#[cfg(feature = "redis-cache")]
pub mod redis;
pub mod store;
pub mod ttl;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::provider::SearchQuery;

pub use local::LocalStore;
#[cfg(feature = "redis-cache")]
pub use self::redis::RedisStore;
pub use store::CacheStore;
pub use ttl::{TtlBucket, TtlError, TtlSelector};

/// Contract of the external key-value store behind [`CacheStore`].
///
/// Values are opaque strings and every write carries an expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Get the raw value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl_secs` seconds
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Remove `keys`, returning how many existed
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// One incremental scan step over keys matching a glob `pattern`.
    ///
    /// Returns the cursor for the next step (0 when the scan is complete) and the
    /// keys found in this step. `count` is a hint for the step size.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)>;
}

/// Statistics about cache performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses, including store failures
    pub misses: u64,

    /// Hit rate as a fraction (0.0 to 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(hits: u64, misses: u64) -> Self {
        let mut stats = Self {
            hits,
            misses,
            hit_rate: 0.0,
        };
        stats.calculate_hit_rate();
        stats
    }

    /// Calculate hit rate from hits and misses
    pub fn calculate_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Builder for consistent cache key naming
pub struct CacheKey;

impl CacheKey {
    /// Key of a flight search result
    pub fn flight_search(query: &SearchQuery) -> String {
        format!(
            "search:flights:{}:{}:{}:{}:{}:{}",
            query.origin.to_uppercase(),
            query.destination.to_uppercase(),
            query.departure_date.format("%Y-%m-%d"),
            query
                .return_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "oneway".to_string()),
            query.adults,
            query.max_results,
        )
    }

    /// Pattern matching every cached search departing from `origin`
    pub fn flight_search_origin_pattern(origin: &str) -> String {
        format!("search:flights:{}:*", origin.to_uppercase())
    }

    /// Well-known key of a provider's bearer credential
    pub fn credential(provider: &str) -> String {
        format!("credentials:{}:access_token", provider)
    }
}

/// Redis-style glob matching supporting `*`, `?` and `\` escapes
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                k += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() && pattern[p + 1] == key[k] => {
                p += 2;
                k += 1;
                continue;
            }
            Some(c) if *c != '\\' && *c == key[k] => {
                p += 1;
                k += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, matched)) => {
                p = star + 1;
                k = matched + 1;
                backtrack = Some((star, matched + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
