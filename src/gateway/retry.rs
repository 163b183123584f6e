//! Rate-limit retry loop.

use std::future::Future;

use tracing::warn;

use super::RetryPolicy;
use crate::Result;
use crate::telemetry;

/// Run `f` until it stops returning 429, up to `policy.max_attempts()`.
///
/// Only [`SiteSafeError::RateLimited`](crate::SiteSafeError::RateLimited)
/// is retried; every other outcome is returned as-is. The final 429 is
/// surfaced unchanged once attempts are exhausted. The backoff suspends
/// only the calling task.
pub(crate) async fn with_retry<F, Fut, T>(policy: &RetryPolicy, method: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;
    loop {
        match f().await {
            Err(e) if e.is_rate_limited() && attempt + 1 < max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                metrics::counter!(telemetry::RETRIES_TOTAL, "method" => method.to_owned())
                    .increment(1);
                warn!(
                    method,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}
