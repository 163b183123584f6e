//! The view hosting an assessment session.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use super::payload::Question;

/// User-visible messages raised by a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The session could not be loaded; the host should leave.
    SessionUnavailable { reason: String },
    /// Submission attempted with nothing answered.
    NoAnswers,
    /// Time ran out before anything was answered.
    ClosingUnanswered,
    /// Submission accepted.
    Submitted { score: f64, total: f64 },
    /// Transport or backend failure while submitting.
    SubmissionFailed { message: String },
    /// The backend answered but refused the submission.
    Rejected { message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionUnavailable { reason } => {
                write!(f, "This assessment session is not available ({reason}).")
            }
            Self::NoAnswers => write!(f, "Please answer at least one question before submitting."),
            Self::ClosingUnanswered => write!(
                f,
                "Time is up and no questions were answered. The assessment will now close."
            ),
            Self::Submitted { score, total } => write!(
                f,
                "Assessment submitted. Your score: {} out of {}.",
                display_points(*score),
                display_points(*total)
            ),
            Self::SubmissionFailed { message } => {
                write!(f, "Failed to submit the assessment: {message}")
            }
            Self::Rejected { message } => write!(f, "Submission was not accepted: {message}"),
        }
    }
}

fn display_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{points:.0}")
    } else {
        format!("{points}")
    }
}

/// Hooks the session runner calls on its host.
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Show a message to the user.
    async fn notify(&self, notice: Notice);

    /// Ask the user to confirm submitting `answered` of `total` questions.
    async fn confirm_submission(&self, answered: usize, total: usize) -> bool;

    /// Leave the assessment view and return to the assessment list.
    async fn leave(&self);

    /// Called on every countdown tick with the time left.
    async fn on_tick(&self, _remaining: Duration) {}

    /// Called when the displayed question changes.
    async fn on_question(&self, _index: usize, _question: &Question) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitted_notice_shows_whole_points() {
        let notice = Notice::Submitted {
            score: 4.0,
            total: 6.0,
        };
        assert_eq!(
            notice.to_string(),
            "Assessment submitted. Your score: 4 out of 6."
        );

        let fractional = Notice::Submitted {
            score: 2.5,
            total: 6.0,
        };
        assert!(fractional.to_string().contains("2.5 out of 6"));
    }
}
