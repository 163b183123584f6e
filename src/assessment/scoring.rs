//! Client-side score.
//!
//! Every answered question is credited its full point value; correctness is
//! graded authoritatively by the server on submission. The client score is
//! for optimistic display only.

use super::payload::{Answers, Question};

/// Points credited when a question carries no usable point value.
pub const DEFAULT_POINTS: f64 = 1.0;

/// Point value of `question`, always a finite number.
///
/// Numbers and numeric strings are used as-is; anything else (missing,
/// null, non-numeric) counts as [`DEFAULT_POINTS`].
pub fn point_value(question: &Question) -> f64 {
    question
        .points
        .as_ref()
        .and_then(numeric)
        .unwrap_or(DEFAULT_POINTS)
}

/// A finite number from a JSON number or numeric string (`"1.00"`).
pub(crate) fn numeric(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|p| p.is_finite())
}

/// Sum of point values of every answered question.
pub fn compute_score(questions: &[Question], answers: &Answers) -> f64 {
    questions
        .iter()
        .filter(|q| answers.contains_key(&q.id))
        .map(point_value)
        .sum()
}

/// Maximum achievable score.
pub fn total_points(questions: &[Question]) -> f64 {
    questions.iter().map(point_value).sum()
}
