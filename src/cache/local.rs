use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{KeyValueStore, glob_match};

/// Internal store entry with expiration
#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: Instant,
}

impl StoreEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Every stored key ordered by its hash. Scan cursors are hashes, so removing
/// a key never moves the ones after it.
type KeyIndex = BTreeSet<(u64, String)>;

fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn index_entry(key: &str) -> (u64, String) {
    (key_hash(key), key.to_string())
}

fn lock(index: &Mutex<KeyIndex>) -> MutexGuard<'_, KeyIndex> {
    index.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process key-value store using DashMap.
///
/// Mirrors the subset of Redis semantics the cache relies on: expiring writes,
/// multi-key delete and cursor-based glob scans. Nothing survives a restart.
///
/// Writers take the index lock before touching `entries`, so the index always
/// holds every live key.
#[derive(Debug)]
pub struct LocalStore {
    entries: Arc<DashMap<String, StoreEntry>>,
    index: Arc<Mutex<KeyIndex>>,
    /// Background cleanup task handle
    cleanup_handle: Option<JoinHandle<()>>,
}

impl LocalStore {
    /// Create a new store with a cleanup task sweeping expired entries every 60 seconds
    pub fn new() -> Self {
        Self::with_cleanup_interval(Duration::from_secs(60))
    }

    pub fn with_cleanup_interval(interval: Duration) -> Self {
        let entries = Arc::new(DashMap::new());
        let index = Arc::new(Mutex::new(KeyIndex::new()));
        let cleanup_handle =
            Self::start_cleanup_task(Arc::clone(&entries), Arc::clone(&index), interval);

        Self {
            entries,
            index,
            cleanup_handle: Some(cleanup_handle),
        }
    }

    fn start_cleanup_task(
        entries: Arc<DashMap<String, StoreEntry>>,
        index: Arc<Mutex<KeyIndex>>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                let mut index = lock(&index);
                entries.retain(|key, entry| {
                    if entry.is_expired() {
                        index.remove(&index_entry(key));
                        false
                    } else {
                        true
                    }
                });
            }
        })
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_live(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| !entry.is_expired())
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalStore {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup_handle.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl KeyValueStore for LocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };

        if value.is_none() {
            let mut index = lock(&self.index);
            if self.entries.remove_if(key, |_, entry| entry.is_expired()).is_some() {
                index.remove(&index_entry(key));
            }
        }

        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        anyhow::ensure!(ttl_secs > 0, "refusing to store {} without an expiry", key);

        let mut index = lock(&self.index);
        self.entries.insert(
            key.to_string(),
            StoreEntry::new(value.to_string(), Duration::from_secs(ttl_secs)),
        );
        index.insert(index_entry(key));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let mut index = lock(&self.index);
        let mut removed = 0;

        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key) {
                index.remove(&index_entry(key));
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    /// Walks the index in hash order starting at `cursor`, visiting about
    /// `count` keys. Keys sharing a hash are always returned in the same step,
    /// and the next cursor is the hash of the first unvisited key.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let limit = count.max(1);
        let index = lock(&self.index);

        let mut visited = 0;
        let mut last_hash = None;
        let mut next = 0;
        let mut matched = Vec::new();

        for (hash, key) in index.range((cursor, String::new())..) {
            if visited >= limit && last_hash != Some(*hash) {
                next = *hash;
                break;
            }
            visited += 1;
            last_hash = Some(*hash);

            if glob_match(pattern, key) && self.is_live(key) {
                matched.push(key.clone());
            }
        }

        Ok((next, matched))
    }
}
