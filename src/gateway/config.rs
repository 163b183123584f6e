//! Gateway client configuration.

use std::time::Duration;

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default client-side request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry behaviour for rate-limited (HTTP 429) responses.
///
/// Exponential backoff without jitter: the wait before retry `n`
/// (0-indexed) is `base_delay * 2^n`. With the defaults that is
/// 1s, 2s, 4s, after which the 429 is surfaced to the caller.
///
/// ```rust
/// # use sitesafe::RetryPolicy;
/// # use std::time::Duration;
/// let policy = RetryPolicy::new()
///     .max_retries(2)
///     .base_delay(Duration::from_millis(250));
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial request. 0 = never retry. Default: 3.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 1000ms.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Total attempts including the initial request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `attempt` (0-indexed): `base_delay * 2^attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Configuration for a [`GatewayClient`](super::GatewayClient).
///
/// ```rust
/// # use sitesafe::GatewayConfig;
/// # use std::time::Duration;
/// let config = GatewayConfig::new("https://api.sitesafe.example/api")
///     .timeout(Duration::from_secs(10))
///     .cache_ttl(Duration::from_secs(60));
/// assert_eq!(config.retry.max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// Client-side deadline per attempt. Default: 30s.
    pub timeout: Duration,
    /// Time-to-live of cached GET responses. Default: 5 minutes.
    pub cache_ttl: Duration,
    /// Capacity of the default in-memory cache. Default: 1,000.
    pub cache_max_entries: u64,
    /// 429 retry policy.
    pub retry: RetryPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_TTL,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            retry: RetryPolicy::default(),
        }
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn cache_max_entries(mut self, n: u64) -> Self {
        self.cache_max_entries = n;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
