use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{CacheStats, KeyValueStore};
use crate::config::CacheConfig;

/// Fail-open cache over a [`KeyValueStore`].
///
/// Store errors never reach the caller: reads degrade to misses and writes or
/// deletes degrade to no-ops, with a warning logged each time.
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    /// Bumped by every delete so in-flight write-backs can tell they are stale
    invalidations: Arc<AtomicU64>,
    default_ttl_secs: u64,
    scan_batch_size: usize,
    delete_batch_size: usize,
    max_pattern_keys: usize,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            invalidations: Arc::new(AtomicU64::new(0)),
            default_ttl_secs: config.default_ttl_secs,
            scan_batch_size: config.scan_batch_size.max(1),
            delete_batch_size: config.delete_batch_size.max(1),
            max_pattern_keys: config.max_pattern_keys,
        }
    }

    /// Cache over `store` with default batching limits
    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, &CacheConfig::default())
    }

    /// A zero `ttl_secs` means the configured default
    fn resolve_ttl(&self, key: &str, ttl_secs: u64) -> Option<u64> {
        match (ttl_secs, self.default_ttl_secs) {
            (0, 0) => {
                tracing::warn!(cache_key = %key, "Refusing to cache without an expiry");
                None
            }
            (0, default) => Some(default),
            (ttl, _) => Some(ttl),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_hits_total").increment(1);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cache_misses_total").increment(1);
    }

    /// Get a value, parsing it as JSON and falling back to the raw string
    pub async fn get<V>(&self, key: &str) -> Option<V>
    where
        V: DeserializeOwned,
    {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(cache_key = %key, "Cache miss");
                self.record_miss();
                return None;
            }
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Cache read failed, treating as miss");
                self.record_miss();
                return None;
            }
        };

        let parsed = serde_json::from_str::<V>(&raw)
            .or_else(|_| serde_json::from_value::<V>(serde_json::Value::String(raw)));

        match parsed {
            Ok(value) => {
                tracing::debug!(cache_key = %key, "Cache hit");
                self.record_hit();
                Some(value)
            }
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Cached value has unexpected shape, treating as miss");
                self.record_miss();
                None
            }
        }
    }

    /// Store a value with an expiry; `ttl_secs` of 0 uses the configured default
    pub async fn set<V>(&self, key: &str, value: &V, ttl_secs: u64)
    where
        V: Serialize + ?Sized,
    {
        let Some(ttl_secs) = self.resolve_ttl(key, ttl_secs) else {
            return;
        };

        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Failed to serialize cache value");
                return;
            }
        };

        match self.store.set_ex(key, &serialized, ttl_secs).await {
            Ok(()) => tracing::debug!(cache_key = %key, ttl_secs, "Cache value set with TTL"),
            Err(err) => tracing::warn!(cache_key = %key, error = %err, "Cache write failed"),
        }
    }

    /// Remove one key. Returns whether a key was removed.
    pub async fn delete(&self, key: &str) -> bool {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        match self.store.del(&[key.to_string()]).await {
            Ok(removed) => removed > 0,
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Cache delete failed");
                false
            }
        }
    }

    /// Remove every key matching a glob `pattern`, returning how many were removed.
    ///
    /// Keys are collected through incremental scans of `scan_batch_size` keys, up
    /// to `max_pattern_keys`; further matches are left in place. Collected keys are
    /// then deleted in batches of `delete_batch_size`.
    pub async fn delete_by_pattern(&self, pattern: &str) -> u64 {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        let mut cursor = 0;
        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        let mut truncated = false;

        loop {
            let (next, keys) = match self.store.scan(cursor, pattern, self.scan_batch_size).await {
                Ok(step) => step,
                Err(err) => {
                    tracing::warn!(pattern, error = %err, "Cache scan failed, deleting keys found so far");
                    break;
                }
            };

            for key in keys {
                if matched.len() >= self.max_pattern_keys {
                    truncated = true;
                    break;
                }
                if seen.insert(key.clone()) {
                    matched.push(key);
                }
            }

            if truncated || next == 0 {
                break;
            }
            cursor = next;
        }

        if truncated {
            tracing::warn!(
                pattern,
                max_keys = self.max_pattern_keys,
                "Pattern delete reached its key cap, remaining matches were not deleted"
            );
        }

        let mut deleted = 0;
        for batch in matched.chunks(self.delete_batch_size) {
            match self.store.del(batch).await {
                Ok(removed) => deleted += removed,
                Err(err) => {
                    tracing::warn!(pattern, batch = batch.len(), error = %err, "Cache batch delete failed")
                }
            }
        }

        tracing::info!(pattern, matched = matched.len(), deleted, "Deleted cache keys by pattern");
        deleted
    }

    /// Read-through helper.
    ///
    /// On a hit the cached value is returned. On a miss `producer` runs and its
    /// result is returned right away; the write-back happens on a spawned task,
    /// so a failing store can never fail the call. Producer errors are not cached.
    ///
    /// A write-back is dropped when any delete ran on this cache after the
    /// producer started, so an invalidation is not undone by a stale value. A
    /// delete landing between that check and the store write is not caught.
    pub async fn wrap<T, E, F, Fut>(&self, key: &str, ttl_secs: u64, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let generation = self.invalidations.load(Ordering::SeqCst);
        let value = producer().await?;

        let Some(ttl_secs) = self.resolve_ttl(key, ttl_secs) else {
            return Ok(value);
        };

        match serde_json::to_string(&value) {
            Ok(serialized) => {
                let store = Arc::clone(&self.store);
                let invalidations = Arc::clone(&self.invalidations);
                let key = key.to_string();
                tokio::spawn(async move {
                    if invalidations.load(Ordering::SeqCst) != generation {
                        tracing::debug!(cache_key = %key, "Cache invalidated while producing, skipping write-back");
                        return;
                    }
                    if let Err(err) = store.set_ex(&key, &serialized, ttl_secs).await {
                        tracing::warn!(cache_key = %key, error = %err, "Cache write-back failed");
                    }
                });
            }
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "Failed to serialize produced value");
            }
        }

        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("store", &self.store)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish_non_exhaustive()
    }
}
