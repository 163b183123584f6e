//! Response cache for GET requests.
//!
//! The gateway consults a [`CacheStore`] before every GET and populates it
//! after every successful GET. The store is injected into the client at
//! construction time; [`MemoryCacheStore`] is the default.
//!
//! # Expiry
//!
//! Entries carry an absolute `expires_at`. A store must never hand out an
//! entry past that instant: expired entries are treated as absent and
//! dropped on the read that finds them. There is no background sweep.
//!
//! # Concurrent misses
//!
//! Two identical GETs in flight at the same time may both miss and both
//! populate the same key. GET responses are assumed idempotent, so the
//! second write simply overwrites the first with an equivalent payload.

mod memory;

pub use memory::{DEFAULT_MAX_ENTRIES, MemoryCacheStore};

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Default time-to-live for cached GET responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// A cached response body.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub expires_at: Instant,
}

impl CachedEntry {
    pub fn new(key: impl Into<String>, payload: serde_json::Value, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            payload,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Whether the entry is stale at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Injectable cache backend.
///
/// Implementations own their entries exclusively; the gateway is the only
/// caller.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a live entry. Expired entries are reported as `None`.
    async fn get(&self, key: &str) -> Option<CachedEntry>;

    /// Insert or overwrite `key`, expiring `ttl` from now.
    async fn set(&self, key: &str, payload: serde_json::Value, ttl: Duration);

    /// Remove `key` if present.
    async fn delete(&self, key: &str);
}

/// Compute the cache key for a GET request.
///
/// Query parameters are sorted (by name, then value) so that the same
/// logical request always maps to the same key regardless of the order the
/// caller supplied them in.
pub fn cache_key(path: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let mut sorted: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    sorted.sort_unstable();
    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{query}")
}

/// Escape the characters that would make two different parameter lists
/// render to the same key.
fn escape(s: &str) -> String {
    s.replace('%', "%25").replace('&', "%26").replace('=', "%3D")
}
