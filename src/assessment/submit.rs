//! Submission request, response, and the backend seam.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::payload::Answers;
use super::scoring::numeric;
use crate::Result;
use crate::gateway::GatewayClient;

/// Body POSTed to the per-session submission resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRequest {
    pub answers: Answers,
    #[serde(serialize_with = "whole_number")]
    pub score: f64,
    #[serde(serialize_with = "iso_timestamp")]
    pub completion_time: DateTime<Utc>,
}

/// Backend acknowledgment. Unknown fields are ignored.
///
/// Only `success` decides the outcome. `score` and `total_points` accept
/// numbers or numeric strings (`"4.00"`); anything else reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmissionResponse {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_points: Option<f64>,
}

impl SubmissionResponse {
    /// Interpret a 2xx body. A body that is not a JSON object (empty, `204`)
    /// is a bare acknowledgment and counts as success.
    pub fn from_body(body: Value) -> Self {
        if !body.is_object() {
            return Self {
                success: true,
                ..Self::default()
            };
        }
        // Every field accepts any JSON value, so an object always parses.
        serde_json::from_value(body).unwrap_or_default()
    }
}

fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(flag) => flag,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(numeric(&Value::deserialize(d)?))
}

// `4` rather than `4.0` when the score is integral.
fn whole_number<S: Serializer>(score: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
    if score.fract() == 0.0 && score.abs() < i64::MAX as f64 {
        s.serialize_i64(*score as i64)
    } else {
        s.serialize_f64(*score)
    }
}

fn iso_timestamp<S: Serializer>(at: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Where a finished assessment is sent.
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    async fn submit(
        &self,
        session_id: &str,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResponse>;
}

/// [`SubmissionApi`] over the gateway client.
#[derive(Debug, Clone)]
pub struct GatewaySubmissionApi {
    client: GatewayClient,
}

impl GatewaySubmissionApi {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    /// Path of the submission resource for `session_id`.
    pub fn submit_path(session_id: &str) -> String {
        format!("/quiz-sessions/{session_id}/submit")
    }
}

#[async_trait]
impl SubmissionApi for GatewaySubmissionApi {
    async fn submit(
        &self,
        session_id: &str,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResponse> {
        let body = serde_json::to_value(request)?;
        let response = self
            .client
            .post(&Self::submit_path(session_id), body)
            .await?;
        Ok(SubmissionResponse::from_body(response))
    }
}
