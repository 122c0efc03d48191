use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::time::timeout;

use super::KeyValueStore;

/// Redis-backed key-value store
///
/// Features:
/// - Async operations using redis::aio::ConnectionManager
/// - Automatic reconnection
/// - Key prefixing for namespace isolation
/// - SET EX for every write
/// - Incremental SCAN for pattern lookups
#[derive(Clone)]
pub struct RedisStore {
    conn_manager: ConnectionManager,
    /// Key prefix for namespace isolation (e.g., "flight-search:")
    prefix: String,
}

impl RedisStore {
    /// Connect with a default timeout of 3 seconds
    ///
    /// # Example
    /// ```no_run
    /// use flight_search::cache::RedisStore;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let store = RedisStore::new("redis://localhost:6379", "flight-search").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(url: &str, prefix: &str) -> Result<Self> {
        Self::with_timeout(url, prefix, Duration::from_secs(3)).await
    }

    pub async fn with_timeout(
        url: &str,
        prefix: &str,
        connection_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::open(url).context("Failed to create Redis client")?;

        let conn_manager = timeout(connection_timeout, ConnectionManager::new(client))
            .await
            .context(format!(
                "Redis connection timeout after {:?}. Check Redis is running at: {}",
                connection_timeout, url
            ))?
            .context("Failed to create Redis connection manager")?;

        Ok(Self {
            conn_manager,
            prefix: format!("{}:", prefix),
        })
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn strip_key(&self, key: String) -> String {
        match key.strip_prefix(&self.prefix) {
            Some(stripped) => stripped.to_string(),
            None => key,
        }
    }

    fn connection(&self) -> ConnectionManager {
        self.conn_manager.clone()
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[tracing::instrument(skip(self), fields(cache_key = %key))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection();

        let value: Option<String> = conn
            .get(self.build_key(key))
            .await
            .context("Failed to get value from Redis")?;

        Ok(value)
    }

    #[tracing::instrument(skip(self, value), fields(cache_key = %key))]
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        anyhow::ensure!(ttl_secs > 0, "refusing to store {} without an expiry", key);
        let mut conn = self.connection();

        let _: () = conn
            .set_ex(self.build_key(key), value, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;

        Ok(())
    }

    #[tracing::instrument(skip(self, keys), fields(keys = keys.len()))]
    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection();
        let full_keys: Vec<String> = keys.iter().map(|key| self.build_key(key)).collect();

        let deleted: u64 = conn
            .del(full_keys)
            .await
            .context("Failed to delete keys from Redis")?;

        Ok(deleted)
    }

    #[tracing::instrument(skip(self))]
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let mut conn = self.connection();

        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(self.build_key(pattern))
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .context("Failed to scan keys in Redis")?;

        Ok((next, keys.into_iter().map(|key| self.strip_key(key)).collect()))
    }
}
