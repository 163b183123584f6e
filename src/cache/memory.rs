//! In-process response cache on a bounded moka cache.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::time::Instant;

use super::{CacheStore, CachedEntry};

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_ENTRIES: u64 = 1_000;

/// In-memory [`CacheStore`] backed by a bounded moka LRU.
///
/// Moka bounds the entry count; expiry is enforced lazily on read against
/// each entry's own `expires_at`, so every entry can carry its own TTL.
pub struct MemoryCacheStore {
    entries: Cache<String, CachedEntry>,
}

impl MemoryCacheStore {
    /// Create an empty store with the default capacity (1,000).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a store with a custom capacity.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max).build(),
        }
    }

    /// Number of entries currently held (live or not yet evicted).
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CachedEntry> {
        let entry = self.entries.get(key).await?;
        if entry.is_expired_at(Instant::now()) {
            self.entries.invalidate(key).await;
            return None;
        }
        Some(entry)
    }

    async fn set(&self, key: &str, payload: serde_json::Value, ttl: Duration) {
        let entry = CachedEntry::new(key, payload, ttl);
        self.entries.insert(key.to_string(), entry).await;
    }

    async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}
