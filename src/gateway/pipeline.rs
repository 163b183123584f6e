//! Request/response pipeline steps.
//!
//! The client runs an explicit, ordered list of steps around each network
//! dispatch instead of relying on implicit hook registration:
//!
//! ```text
//! request:  AttachAuth → ConsultCache → [dispatch with 429 retry]
//! response: NormalizeTimeout → PopulateCache
//! ```
//!
//! A request step may short-circuit with a payload ([`Flow::Respond`]); the
//! remaining request steps, the dispatch, and all response steps are then
//! skipped, so a cache hit resolves exactly like a network response.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::cache::{CacheStore, cache_key};
use crate::storage::{ClientStorage, keys};
use crate::telemetry;
use crate::{Result, SiteSafeError};

/// Everything known about an outbound request while it moves through the
/// pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
    /// Set by [`ConsultCache`] for GET requests.
    pub cache_key: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            cache_key: None,
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// Outcome of a request step.
#[derive(Debug)]
pub enum Flow {
    /// Hand the (possibly modified) context to the next step.
    Continue,
    /// Resolve immediately with this payload; nothing is sent.
    Respond(serde_json::Value),
}

/// A step run before dispatch.
#[async_trait]
pub trait RequestStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_request(&self, ctx: &mut RequestContext) -> Result<Flow>;
}

/// A step run after dispatch, on success and failure alike.
#[async_trait]
pub trait ResponseStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_response(
        &self,
        ctx: &RequestContext,
        outcome: Result<serde_json::Value>,
    ) -> Result<serde_json::Value>;
}

// ============================================================================
// AttachAuth
// ============================================================================

/// Attach the stored bearer credential, if any, to every request.
///
/// A missing credential is not an error here; the API decides whether the
/// request needs one.
pub struct AttachAuth {
    storage: Arc<dyn ClientStorage>,
}

impl AttachAuth {
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RequestStep for AttachAuth {
    fn name(&self) -> &'static str {
        "attach_auth"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> Result<Flow> {
        let token = match self.storage.get_item(keys::TOKEN) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "could not read stored credential; sending without it");
                None
            }
        };
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            return Ok(Flow::Continue);
        };

        match HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                ctx.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("stored credential is not a valid header value; skipping"),
        }
        Ok(Flow::Continue)
    }
}

// ============================================================================
// ConsultCache / PopulateCache
// ============================================================================

/// Serve GET requests from the cache when a live entry exists.
pub struct ConsultCache {
    store: Arc<dyn CacheStore>,
}

impl ConsultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RequestStep for ConsultCache {
    fn name(&self) -> &'static str {
        "consult_cache"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> Result<Flow> {
        if !ctx.is_get() {
            return Ok(Flow::Continue);
        }
        let key = cache_key(&ctx.path, &ctx.params);
        let hit = self.store.get(&key).await;
        ctx.cache_key = Some(key);

        match hit {
            Some(entry) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(key = %entry.key, "cache hit");
                Ok(Flow::Respond(entry.payload))
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(key = ctx.cache_key.as_deref().unwrap_or_default(), "cache miss");
                Ok(Flow::Continue)
            }
        }
    }
}

/// Store successful GET responses under the key [`ConsultCache`] computed.
pub struct PopulateCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl PopulateCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }
}

#[async_trait]
impl ResponseStep for PopulateCache {
    fn name(&self) -> &'static str {
        "populate_cache"
    }

    async fn on_response(
        &self,
        ctx: &RequestContext,
        outcome: Result<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        if let (Ok(payload), Some(key)) = (&outcome, &ctx.cache_key)
            && ctx.is_get()
        {
            self.store.set(key, payload.clone(), self.ttl).await;
        }
        outcome
    }
}

// ============================================================================
// NormalizeTimeout
// ============================================================================

/// Replace transport timeouts with [`SiteSafeError::Timeout`].
///
/// Method and URL are carried over; the transport's own message moves to
/// `detail` and `message` becomes [`TIMEOUT_MESSAGE`](crate::error::TIMEOUT_MESSAGE).
pub struct NormalizeTimeout;

#[async_trait]
impl ResponseStep for NormalizeTimeout {
    fn name(&self) -> &'static str {
        "normalize_timeout"
    }

    async fn on_response(
        &self,
        _ctx: &RequestContext,
        outcome: Result<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        outcome.map_err(normalize_timeout)
    }
}

/// Rewrite a timed-out transport error; every other error passes through.
pub fn normalize_timeout(err: SiteSafeError) -> SiteSafeError {
    match err {
        SiteSafeError::Transport {
            method,
            url,
            message,
            timeout: true,
        } => SiteSafeError::Timeout {
            method,
            url,
            message: crate::error::TIMEOUT_MESSAGE.to_string(),
            detail: message,
        },
        other => other,
    }
}
