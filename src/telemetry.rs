//! Telemetry metric name constants.
//!
//! Centralised metric names for sitesafe operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `sitesafe_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `method`: HTTP verb ("GET", "POST", ...)
//! - `status`: outcome: HTTP status code, "ok", "rejected" or "error"
//! - `trigger`: who started a submission: "user" or "expiry"

/// Total requests that reached the network (cache hits excluded).
///
/// Labels: `method`, `status`.
pub const REQUESTS_TOTAL: &str = "sitesafe_requests_total";

/// Network request duration in seconds.
///
/// Labels: `method`.
pub const REQUEST_DURATION_SECONDS: &str = "sitesafe_request_duration_seconds";

/// Total retry attempts after a 429 (not counting the initial request).
///
/// Labels: `method`.
pub const RETRIES_TOTAL: &str = "sitesafe_retries_total";

/// Total GET requests served from the response cache.
pub const CACHE_HITS_TOTAL: &str = "sitesafe_cache_hits_total";

/// Total GET requests that missed the response cache.
pub const CACHE_MISSES_TOTAL: &str = "sitesafe_cache_misses_total";

/// Total assessment submissions sent to the backend.
///
/// Labels: `trigger` ("user" | "expiry"), `status` ("ok" | "rejected" | "error").
pub const SUBMISSIONS_TOTAL: &str = "sitesafe_submissions_total";
