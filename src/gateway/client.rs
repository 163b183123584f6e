//! The gateway client and its builder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::pipeline::{
    AttachAuth, ConsultCache, Flow, NormalizeTimeout, PopulateCache, RequestContext, RequestStep,
    ResponseStep,
};
use super::retry::with_retry;
use super::{GatewayConfig, RetryPolicy};
use crate::cache::{CacheStore, MemoryCacheStore};
use crate::storage::{ClientStorage, MemoryStorage};
use crate::{Result, SiteSafeError, telemetry, version};

/// Optional parts of a request.
///
/// ```rust
/// # use sitesafe::RequestOptions;
/// let opts = RequestOptions::new()
///     .param("active", "true")
///     .body(serde_json::json!({"name": "Scaffold safety"}));
/// assert_eq!(opts.params.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Set the JSON request body.
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Single choke point for calls to the SiteSafe API.
///
/// Every request gets the stored bearer credential attached. GETs are served
/// from and written to the response cache. 429s are retried with
/// exponential backoff, and transport timeouts are normalized into
/// [`SiteSafeError::Timeout`]. A 401 is returned unchanged as
/// [`SiteSafeError::Api`] for the caller's session handling to act on.
///
/// Cheap to clone; clones share the HTTP connection pool and the cache.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
    request_steps: Arc<Vec<Arc<dyn RequestStep>>>,
    response_steps: Arc<Vec<Arc<dyn ResponseStep>>>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field(
                "request_steps",
                &self.request_steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field(
                "response_steps",
                &self.response_steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl GatewayClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> GatewayClientBuilder {
        GatewayClientBuilder::new()
    }

    /// Build a client from `config` with the default in-memory cache.
    pub fn from_config(config: GatewayConfig, storage: Arc<dyn ClientStorage>) -> Result<Self> {
        Self::builder().config(config).storage(storage).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request through the pipeline and return the response body.
    ///
    /// Empty bodies resolve to `Value::Null`; non-JSON bodies to
    /// `Value::String`.
    #[instrument(skip(self, method, options), fields(method = %method))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<serde_json::Value> {
        let (path, mut params) = split_inline_query(path)?;
        params.extend(options.params);
        let mut ctx = RequestContext::new(method, path);
        ctx.params = params;
        ctx.body = options.body;

        for step in self.request_steps.iter() {
            if let Flow::Respond(payload) = step.on_request(&mut ctx).await? {
                debug!(step = step.name(), path, "request answered without dispatch");
                return Ok(payload);
            }
        }

        let mut outcome =
            with_retry(&self.retry, ctx.method.as_str(), || self.dispatch(&ctx)).await;
        for step in self.response_steps.iter() {
            outcome = step.on_response(&ctx, outcome).await;
        }
        outcome
    }

    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<serde_json::Value> {
        let options = params
            .iter()
            .fold(RequestOptions::new(), |opts, (k, v)| opts.param(*k, v));
        self.request(Method::GET, path, options).await
    }

    /// GET and deserialize the body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let value = self.get(path, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        self.request(Method::POST, path, RequestOptions::new().body(body)).await
    }

    pub async fn put(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        self.request(Method::PUT, path, RequestOptions::new().body(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<serde_json::Value> {
        self.request(Method::DELETE, path, RequestOptions::new()).await
    }

    fn url_for(&self, ctx: &RequestContext) -> Result<Url> {
        let path = ctx.path.trim_start_matches('/');
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw)
            .map_err(|e| SiteSafeError::Configuration(format!("invalid URL {raw:?}: {e}")))?;
        if !ctx.params.is_empty() {
            url.query_pairs_mut().extend_pairs(ctx.params.iter());
        }
        Ok(url)
    }

    /// One network attempt.
    async fn dispatch(&self, ctx: &RequestContext) -> Result<serde_json::Value> {
        let url = self.url_for(ctx)?;
        let method = ctx.method.as_str().to_owned();
        let transport_err = |e: reqwest::Error| SiteSafeError::Transport {
            method: method.clone(),
            url: url.to_string(),
            message: e.to_string(),
            timeout: e.is_timeout(),
        };

        let mut builder = self
            .http
            .request(ctx.method.clone(), url.clone())
            .headers(ctx.headers.clone());
        if let Some(body) = &ctx.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let sent = builder.send().await;
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "method" => method.clone())
            .record(start.elapsed().as_secs_f64());

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                metrics::counter!(telemetry::REQUESTS_TOTAL,
                    "method" => method.clone(),
                    "status" => "error",
                )
                .increment(1);
                return Err(transport_err(e));
            }
        };

        let status = response.status();
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "method" => method.clone(),
            "status" => status.as_u16().to_string(),
        )
        .increment(1);
        debug!(%url, status = status.as_u16(), "response received");

        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.map_err(transport_err)?;
        let body = parse_body(&text);

        if status.is_success() {
            Ok(body)
        } else if status.as_u16() == 429 {
            Err(SiteSafeError::RateLimited { retry_after, body })
        } else {
            Err(SiteSafeError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

/// Builder for [`GatewayClient`].
pub struct GatewayClientBuilder {
    config: GatewayConfig,
    storage: Option<Arc<dyn ClientStorage>>,
    cache: Option<Arc<dyn CacheStore>>,
    extra_request_steps: Vec<Arc<dyn RequestStep>>,
    extra_response_steps: Vec<Arc<dyn ResponseStep>>,
}

impl GatewayClientBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            storage: None,
            cache: None,
            extra_request_steps: Vec::new(),
            extra_response_steps: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Client-side deadline per attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Storage the bearer credential is read from. Default: empty memory
    /// storage (requests go out unauthenticated).
    pub fn storage(mut self, storage: Arc<dyn ClientStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Inject a cache backend. Default: [`MemoryCacheStore`] sized by
    /// `cache_max_entries`.
    pub fn cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Append a request step after the built-in ones.
    pub fn request_step(mut self, step: Arc<dyn RequestStep>) -> Self {
        self.extra_request_steps.push(step);
        self
    }

    /// Append a response step after the built-in ones.
    pub fn response_step(mut self, step: Arc<dyn ResponseStep>) -> Self {
        self.extra_response_steps.push(step);
        self
    }

    pub fn build(self) -> Result<GatewayClient> {
        Url::parse(&self.config.base_url).map_err(|e| {
            SiteSafeError::Configuration(format!(
                "invalid base URL {:?}: {e}",
                self.config.base_url
            ))
        })?;

        let mut default_headers = HeaderMap::new();
        if let Ok(agent) = version::user_agent().parse() {
            default_headers.insert(USER_AGENT, agent);
        }
        let http = Client::builder()
            .timeout(self.config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| SiteSafeError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(MemoryCacheStore::with_max_entries(
                self.config.cache_max_entries,
            ))
        });

        let mut request_steps: Vec<Arc<dyn RequestStep>> = vec![
            Arc::new(AttachAuth::new(storage)),
            Arc::new(ConsultCache::new(cache.clone())),
        ];
        request_steps.extend(self.extra_request_steps);

        let mut response_steps: Vec<Arc<dyn ResponseStep>> = vec![
            Arc::new(NormalizeTimeout),
            Arc::new(PopulateCache::new(cache, self.config.cache_ttl)),
        ];
        response_steps.extend(self.extra_response_steps);

        Ok(GatewayClient {
            http,
            base_url: self.config.base_url,
            retry: self.config.retry,
            request_steps: Arc::new(request_steps),
            response_steps: Arc::new(response_steps),
        })
    }
}

impl Default for GatewayClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Move a `?a=1&b=2` suffix on `path` into decoded pairs, so the cache key
/// and the dispatched URL see one parameter list.
fn split_inline_query(path: &str) -> Result<(&str, Vec<(String, String)>)> {
    let Some((path, query)) = path.split_once('?') else {
        return Ok((path, Vec::new()));
    };
    let mut scratch = Url::parse("http://localhost/")
        .map_err(|e| SiteSafeError::Configuration(format!("query parsing: {e}")))?;
    scratch.set_query(Some(query));
    let pairs = scratch
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Ok((path, pairs))
}
