//! Drive an [`AssessmentSession`] against its host.
//!
//! [`run_session`] is the event loop of one attempt: it waits on countdown
//! ticks and host commands, applies them to the session, and ends when the
//! attempt is submitted, closed unanswered, exited, or detached from its host.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::host::{Notice, SessionHost};
use super::session::{AssessmentSession, ExpiryAction, Phase, TickOutcome};
use super::submit::SubmissionApi;
use crate::storage::ClientStorage;
use crate::{SiteSafeError, telemetry};

/// Input from the hosting view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select { question_id: String, option: String },
    Next,
    Previous,
    JumpTo(usize),
    Submit,
    Exit,
}

/// How a session run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionExit {
    /// Accepted by the backend; the persisted snapshot has been cleared.
    Submitted { score: f64, total: f64 },
    /// Time ran out with nothing answered; nothing was sent.
    ClosedUnanswered,
    /// The user left; the persisted snapshot has been cleared.
    Exited,
    /// The host dropped its command sender. The snapshot survives for resume.
    Detached,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    User,
    Expiry,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Trigger::User => "user",
            Trigger::Expiry => "expiry",
        }
    }
}

/// Load the session for a view, or tell the host to leave.
pub async fn open_session(
    candidate: Option<serde_json::Value>,
    storage: Arc<dyn ClientStorage>,
    host: &dyn SessionHost,
) -> Option<AssessmentSession> {
    match AssessmentSession::open(candidate, storage) {
        Ok(session) => Some(session),
        Err(e) => {
            let reason = match e {
                SiteSafeError::InvalidSession(reason) => reason,
                other => other.to_string(),
            };
            host.notify(Notice::SessionUnavailable { reason }).await;
            host.leave().await;
            None
        }
    }
}

/// Run `session` until it ends. Starts the countdown.
pub async fn run_session(
    mut session: AssessmentSession,
    mut commands: mpsc::Receiver<Command>,
    host: &dyn SessionHost,
    api: &dyn SubmissionApi,
) -> SessionExit {
    session.start_countdown();
    show_current(&session, host).await;

    loop {
        tokio::select! {
            Some(()) = session.next_tick() => {
                match session.tick() {
                    TickOutcome::Running(remaining) => host.on_tick(remaining).await,
                    TickOutcome::Expired => match session.expiry_action() {
                        ExpiryAction::AutoSubmit => {
                            if let Some(exit) = submit(&mut session, host, api, Trigger::Expiry).await {
                                return exit;
                            }
                        }
                        ExpiryAction::CloseUnanswered => {
                            info!(session = %session.session_id(), "closing unanswered assessment");
                            host.notify(Notice::ClosingUnanswered).await;
                            session.teardown();
                            host.leave().await;
                            return SessionExit::ClosedUnanswered;
                        }
                    },
                    TickOutcome::Idle => {}
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!(session = %session.session_id(), "host detached");
                    session.teardown();
                    return SessionExit::Detached;
                };
                if let Some(exit) = apply(&mut session, command, host, api).await {
                    return exit;
                }
            }
        }
    }
}

async fn apply(
    session: &mut AssessmentSession,
    command: Command,
    host: &dyn SessionHost,
    api: &dyn SubmissionApi,
) -> Option<SessionExit> {
    match command {
        Command::Select {
            question_id,
            option,
        } => {
            if let Err(e) = session.select_answer(&question_id, option) {
                warn!(session = %session.session_id(), question = %question_id, error = %e, "answer ignored");
            }
        }
        Command::Next => {
            if session.next() {
                show_current(session, host).await;
            }
        }
        Command::Previous => {
            if session.previous() {
                show_current(session, host).await;
            }
        }
        Command::JumpTo(index) => {
            if session.jump_to(index) {
                show_current(session, host).await;
            }
        }
        Command::Submit => {
            if session.phase() != Phase::Ready {
                debug!(session = %session.session_id(), phase = ?session.phase(), "submit ignored");
                return None;
            }
            if session.answered_count() == 0 {
                host.notify(Notice::NoAnswers).await;
                return None;
            }
            let confirmed = host
                .confirm_submission(session.answered_count(), session.total_questions())
                .await;
            if !confirmed {
                return None;
            }
            return submit(session, host, api, Trigger::User).await;
        }
        Command::Exit => {
            info!(session = %session.session_id(), "assessment exited by user");
            session.exit();
            host.leave().await;
            return Some(SessionExit::Exited);
        }
    }
    None
}

async fn show_current(session: &AssessmentSession, host: &dyn SessionHost) {
    host.on_question(session.current_index(), session.current_question())
        .await;
}

async fn submit(
    session: &mut AssessmentSession,
    host: &dyn SessionHost,
    api: &dyn SubmissionApi,
    trigger: Trigger,
) -> Option<SessionExit> {
    let request = match session.begin_submission() {
        Ok(request) => request,
        Err(e) => {
            debug!(session = %session.session_id(), error = %e, "submission not started");
            return None;
        }
    };
    info!(
        session = %session.session_id(),
        trigger = trigger.as_str(),
        answered = request.answers.len(),
        score = request.score,
        "submitting assessment"
    );

    let outcome = api.submit(session.session_id(), &request).await;
    let status = match &outcome {
        Ok(response) if response.success => "ok",
        Ok(_) => "rejected",
        Err(_) => "error",
    };
    metrics::counter!(telemetry::SUBMISSIONS_TOTAL,
        "trigger" => trigger.as_str(),
        "status" => status,
    )
    .increment(1);

    match outcome {
        Ok(response) if response.success => {
            let score = response.score.unwrap_or(request.score);
            let total = response.total_points.unwrap_or_else(|| session.total_points());
            session.complete_submission();
            host.notify(Notice::Submitted { score, total }).await;
            host.leave().await;
            Some(SessionExit::Submitted { score, total })
        }
        Ok(response) => {
            let message = response
                .message
                .unwrap_or_else(|| "Submission failed".to_string());
            session.fail_submission(SiteSafeError::SubmissionRejected(message.clone()).to_string());
            host.notify(Notice::Rejected { message }).await;
            None
        }
        Err(e) => {
            let message = e.user_message();
            session.fail_submission(e.to_string());
            host.notify(Notice::SubmissionFailed { message }).await;
            None
        }
    }
}
