//! SiteSafe error types

use std::time::Duration;

/// User-facing message carried by every normalized timeout error.
pub const TIMEOUT_MESSAGE: &str =
    "The request timed out. Please check your connection and try again.";

/// SiteSafe error types
#[derive(Debug, thiserror::Error)]
pub enum SiteSafeError {
    // Transport/network errors
    /// No response was received (connection refused, reset, DNS, ...).
    ///
    /// `timeout` is set when the transport aborted because the configured
    /// request deadline elapsed. The gateway pipeline rewrites those into
    /// [`SiteSafeError::Timeout`] before they reach callers.
    #[error("HTTP error: {method} {url}: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
        timeout: bool,
    },

    #[error("{message}")]
    Timeout {
        method: String,
        url: String,
        message: String,
        /// Original transport error text.
        detail: String,
    },

    /// Non-2xx response. A 401 lands here untouched.
    #[error("API error ({status}): {body}")]
    Api {
        status: u16,
        body: serde_json::Value,
    },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Option<Duration>,
        body: serde_json::Value,
    },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Assessment errors
    #[error("invalid assessment session: {0}")]
    InvalidSession(String),

    #[error("no questions have been answered")]
    NoAnswers,

    #[error("assessment has already been submitted")]
    AlreadySubmitted,

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
}

impl SiteSafeError {
    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            SiteSafeError::Api { status, .. } => Some(*status),
            SiteSafeError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether this is a 429 that the gateway may retry.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SiteSafeError::RateLimited { .. })
    }

    /// Whether the server refused the credential (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Whether the request was aborted by the client-side deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SiteSafeError::Timeout { .. } | SiteSafeError::Transport { timeout: true, .. }
        )
    }

    /// Server-provided body, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            SiteSafeError::Api { body, .. } | SiteSafeError::RateLimited { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Text fit for showing to a user.
    ///
    /// Prefers a `message` or `detail` string from the response body, then
    /// the error's own display form.
    pub fn user_message(&self) -> String {
        let from_body = self.body().and_then(|body| match body {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Object(obj) => ["message", "detail", "error"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(|v| v.as_str()).map(str::to_owned)),
            _ => None,
        });
        from_body.unwrap_or_else(|| self.to_string())
    }
}

/// Result type alias for SiteSafe operations
pub type Result<T> = std::result::Result<T, SiteSafeError>;
