//! Assessment payload types and their JSON forms.
//!
//! The backend hands out a payload of `session`, `course`, `enrollment`,
//! `questionBank` and `questions`. Only `session` and `questions` are
//! interpreted here; the rest is carried opaquely so the persisted snapshot
//! round-trips everything the view was given.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Result, SiteSafeError};

/// Selected option per question id.
pub type Answers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, alias = "question_text", alias = "question")]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Raw point value as sent by the server; may be missing or non-numeric.
    /// See [`point_value`](super::scoring::point_value).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    /// Fixed at creation; never extended.
    pub deadline: DateTime<Utc>,
    pub is_retake: bool,
}

/// A validated assessment payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentPayload {
    pub session: SessionInfo,
    pub course: serde_json::Value,
    pub enrollment: serde_json::Value,
    #[serde(rename = "questionBank")]
    pub question_bank: serde_json::Value,
    pub questions: Vec<Question>,
}

#[derive(Deserialize)]
struct RawSession {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, alias = "expires_at", alias = "expiresAt", alias = "end_time")]
    deadline: Option<serde_json::Value>,
    #[serde(default, alias = "isRetake")]
    is_retake: bool,
}

#[derive(Deserialize)]
struct RawPayload {
    #[serde(default)]
    session: Option<RawSession>,
    #[serde(default)]
    course: serde_json::Value,
    #[serde(default)]
    enrollment: serde_json::Value,
    #[serde(default, rename = "questionBank", alias = "question_bank")]
    question_bank: serde_json::Value,
    #[serde(default)]
    questions: Vec<Question>,
}

impl AssessmentPayload {
    /// Validate an untyped payload.
    ///
    /// Fails with [`SiteSafeError::InvalidSession`] when the session block,
    /// its identifier, or its deadline is missing or unusable.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawPayload = serde_json::from_value(value)
            .map_err(|e| SiteSafeError::InvalidSession(format!("malformed payload: {e}")))?;

        let session = raw
            .session
            .ok_or_else(|| SiteSafeError::InvalidSession("missing session".into()))?;
        let id = session
            .id
            .as_ref()
            .and_then(id_from_value)
            .ok_or_else(|| SiteSafeError::InvalidSession("missing session id".into()))?;
        let deadline = session
            .deadline
            .as_ref()
            .and_then(parse_deadline)
            .ok_or_else(|| SiteSafeError::InvalidSession("missing session deadline".into()))?;

        Ok(Self {
            session: SessionInfo {
                id,
                deadline,
                is_retake: session.is_retake,
            },
            course: raw.course,
            enrollment: raw.enrollment,
            question_bank: raw.question_bank,
            questions: raw.questions,
        })
    }

    /// Whether `question_id` belongs to this payload.
    pub fn has_question(&self, question_id: &str) -> bool {
        self.questions.iter().any(|q| q.id == question_id)
    }
}

/// Persisted form: the payload plus the answers recorded so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub payload: AssessmentPayload,
    pub answers: Answers,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    #[serde(flatten)]
    payload: &'a AssessmentPayload,
    answers: &'a Answers,
}

impl Snapshot {
    pub fn new(payload: AssessmentPayload) -> Self {
        Self {
            payload,
            answers: Answers::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&SnapshotRef {
            payload: &self.payload,
            answers: &self.answers,
        })?)
    }

    /// Parse a stored snapshot. Answers for ids that are not questions of
    /// the payload are dropped.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| SiteSafeError::InvalidSession(format!("corrupt snapshot: {e}")))?;
        let answers = value
            .as_object_mut()
            .and_then(|obj| obj.remove("answers"))
            .map(serde_json::from_value::<Answers>)
            .transpose()
            .map_err(|e| SiteSafeError::InvalidSession(format!("corrupt answers: {e}")))?
            .unwrap_or_default();
        let payload = AssessmentPayload::from_value(value)?;

        let answers = answers
            .into_iter()
            .filter(|(id, _)| payload.has_question(id))
            .collect();
        Ok(Self { payload, answers })
    }
}

fn id_from_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    id_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom("question id must be a string or number"))
}

/// Accept RFC 3339, a naive ISO-8601 timestamp (taken as UTC), or epoch
/// milliseconds.
fn parse_deadline(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
