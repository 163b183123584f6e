//! The timed assessment state machine.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::countdown::{Countdown, TICK};
use super::loader::{self, SessionSource};
use super::payload::{Answers, Question, Snapshot};
use super::scoring;
use super::submit::SubmissionRequest;
use crate::storage::ClientStorage;
use crate::{Result, SiteSafeError};

/// Time granted when a resumed session's deadline has already passed.
pub const FALLBACK_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// Lifecycle phase. `Loading` is [`load_session`](super::load_session);
/// answering and navigating both happen in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Submitting,
    Submitted,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time left after this tick.
    Running(Duration),
    /// The countdown just reached zero.
    Expired,
    /// Nothing to count: already expired, submitting, or submitted.
    Idle,
}

/// What expiry should do with the current answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryAction {
    /// At least one answer: submit without confirmation.
    AutoSubmit,
    /// Nothing answered: close the session without submitting.
    CloseUnanswered,
}

/// One timed quiz attempt.
///
/// Owns the answers, the countdown handle, and the persisted snapshot under
/// [`keys::CURRENT_ASSESSMENT`](crate::storage::keys::CURRENT_ASSESSMENT).
pub struct AssessmentSession {
    snapshot: Snapshot,
    source: SessionSource,
    storage: Arc<dyn ClientStorage>,
    phase: Phase,
    current: usize,
    remaining: Duration,
    expired: bool,
    submission_attempts: u32,
    last_error: Option<String>,
    countdown: Option<Countdown>,
}

impl std::fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("session", &self.snapshot.payload.session.id)
            .field("phase", &self.phase)
            .field("current", &self.current)
            .field("answered", &self.snapshot.answers.len())
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl AssessmentSession {
    /// Load (see [`load_session`](super::load_session)) and enter `Ready`.
    pub fn open(
        candidate: Option<serde_json::Value>,
        storage: Arc<dyn ClientStorage>,
    ) -> Result<Self> {
        Self::open_at(candidate, storage, Utc::now())
    }

    /// [`open`](Self::open) with an explicit clock reading.
    pub fn open_at(
        candidate: Option<serde_json::Value>,
        storage: Arc<dyn ClientStorage>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let (snapshot, source) = loader::load_session(candidate, storage.as_ref())?;
        Self::enter_ready(snapshot, source, storage, now)
    }

    fn enter_ready(
        snapshot: Snapshot,
        source: SessionSource,
        storage: Arc<dyn ClientStorage>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if snapshot.payload.questions.is_empty() {
            if let Err(e) = loader::purge(storage.as_ref()) {
                warn!(error = %e, "failed to purge persisted assessment");
            }
            return Err(SiteSafeError::InvalidSession(
                "assessment has no questions".into(),
            ));
        }

        let remaining = remaining_at(snapshot.payload.session.deadline, now);
        info!(
            session = %snapshot.payload.session.id,
            questions = snapshot.payload.questions.len(),
            remaining_secs = remaining.as_secs(),
            ?source,
            "assessment ready"
        );

        Ok(Self {
            snapshot,
            source,
            storage,
            phase: Phase::Ready,
            current: 0,
            remaining,
            expired: false,
            submission_attempts: 0,
            last_error: None,
            countdown: None,
        })
    }

    // ===== Accessors =====

    pub fn session_id(&self) -> &str {
        &self.snapshot.payload.session.id
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.snapshot.payload.session.deadline
    }

    pub fn is_retake(&self) -> bool {
        self.snapshot.payload.session.is_retake
    }

    pub fn source(&self) -> SessionSource {
        self.source
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_submitted(&self) -> bool {
        self.phase == Phase::Submitted
    }

    pub fn questions(&self) -> &[Question] {
        &self.snapshot.payload.questions
    }

    pub fn answers(&self) -> &Answers {
        &self.snapshot.answers
    }

    pub fn answered_count(&self) -> usize {
        self.snapshot.answers.len()
    }

    pub fn total_questions(&self) -> usize {
        self.snapshot.payload.questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        // `enter_ready` guarantees at least one question and navigation keeps
        // `current` in bounds.
        &self.snapshot.payload.questions[self.current]
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn submission_attempts(&self) -> u32 {
        self.submission_attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn score(&self) -> f64 {
        scoring::compute_score(&self.snapshot.payload.questions, &self.snapshot.answers)
    }

    pub fn total_points(&self) -> f64 {
        scoring::total_points(&self.snapshot.payload.questions)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    // ===== Answering =====

    /// Record (or overwrite) the answer to `question_id`.
    ///
    /// Rejected once submission has begun. Does not touch the countdown.
    pub fn select_answer(&mut self, question_id: &str, option: impl Into<String>) -> Result<()> {
        if self.phase != Phase::Ready {
            return Err(SiteSafeError::AlreadySubmitted);
        }
        if !self.snapshot.payload.has_question(question_id) {
            return Err(SiteSafeError::UnknownQuestion(question_id.to_string()));
        }
        self.snapshot
            .answers
            .insert(question_id.to_string(), option.into());
        self.persist();
        Ok(())
    }

    /// Answer the question currently displayed with its `option_index`-th option.
    pub fn select_option(&mut self, option_index: usize) -> Result<()> {
        let question = self.current_question();
        let option = question.options.get(option_index).cloned().ok_or_else(|| {
            SiteSafeError::UnknownQuestion(format!("{}#option{option_index}", question.id))
        })?;
        let id = question.id.clone();
        self.select_answer(&id, option)
    }

    fn persist(&self) {
        if let Err(e) = loader::persist(self.storage.as_ref(), &self.snapshot) {
            warn!(session = %self.session_id(), error = %e, "failed to persist assessment");
        }
    }

    // ===== Navigating =====

    /// Move to the next question. `false` at the last question.
    pub fn next(&mut self) -> bool {
        self.jump_to(self.current + 1)
    }

    /// Move to the previous question. `false` at the first question.
    pub fn previous(&mut self) -> bool {
        match self.current.checked_sub(1) {
            Some(index) => self.jump_to(index),
            None => false,
        }
    }

    /// Display question `index`. Out-of-range indices are ignored.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index >= self.total_questions() || index == self.current {
            return false;
        }
        self.current = index;
        true
    }

    // ===== Countdown =====

    /// Start the one-second countdown. Restarting replaces the old task.
    pub fn start_countdown(&mut self) {
        self.start_countdown_at(Utc::now());
    }

    /// [`start_countdown`](Self::start_countdown) with an explicit clock
    /// reading. Time left is re-read from the deadline while it is still
    /// ahead; a fallback window keeps counting from where it was.
    pub fn start_countdown_at(&mut self, now: DateTime<Utc>) {
        if let Some(mut old) = self.countdown.take() {
            old.cancel();
        }
        if self.phase == Phase::Ready && !self.expired {
            if self.deadline() > now {
                self.remaining = remaining_at(self.deadline(), now);
            }
            self.countdown = Some(Countdown::start(TICK));
        }
    }

    /// Cancel the countdown task, if running.
    pub fn cancel_countdown(&mut self) {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.cancel();
        }
        self.countdown = None;
    }

    /// Wait for the next countdown tick. `None` when no countdown runs.
    pub async fn next_tick(&mut self) -> Option<()> {
        match self.countdown.as_mut() {
            Some(countdown) => countdown.tick().await,
            None => None,
        }
    }

    /// Count down one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.expired || self.phase != Phase::Ready {
            return TickOutcome::Idle;
        }
        self.remaining = self.remaining.saturating_sub(TICK);
        if self.remaining.is_zero() {
            self.expired = true;
            self.cancel_countdown();
            info!(session = %self.session_id(), answered = self.answered_count(), "assessment time expired");
            TickOutcome::Expired
        } else {
            TickOutcome::Running(self.remaining)
        }
    }

    pub fn expiry_action(&self) -> ExpiryAction {
        if self.snapshot.answers.is_empty() {
            ExpiryAction::CloseUnanswered
        } else {
            ExpiryAction::AutoSubmit
        }
    }

    // ===== Submitting =====

    /// Move to `Submitting` and build the request body.
    ///
    /// Fails with [`SiteSafeError::AlreadySubmitted`] while a submission is
    /// in flight or done, and with [`SiteSafeError::NoAnswers`] when
    /// nothing has been answered. Confirmation is the caller's job.
    pub fn begin_submission(&mut self) -> Result<SubmissionRequest> {
        self.begin_submission_at(Utc::now())
    }

    pub fn begin_submission_at(&mut self, completed_at: DateTime<Utc>) -> Result<SubmissionRequest> {
        if self.phase != Phase::Ready {
            return Err(SiteSafeError::AlreadySubmitted);
        }
        if self.snapshot.answers.is_empty() {
            return Err(SiteSafeError::NoAnswers);
        }
        self.phase = Phase::Submitting;
        self.submission_attempts += 1;
        self.last_error = None;

        Ok(SubmissionRequest {
            answers: self.snapshot.answers.clone(),
            score: self.score(),
            completion_time: completed_at,
        })
    }

    /// The backend acknowledged the submission.
    /// Ignored unless a submission is in flight.
    pub fn complete_submission(&mut self) {
        if self.phase != Phase::Submitting {
            warn!(session = %self.session_id(), phase = ?self.phase, "completion without a submission in flight");
            return;
        }
        self.phase = Phase::Submitted;
        self.cancel_countdown();
        if let Err(e) = loader::purge(self.storage.as_ref()) {
            warn!(session = %self.session_id(), error = %e, "failed to clear submitted assessment");
        }
        info!(session = %self.session_id(), score = self.score(), "assessment submitted");
    }

    /// The submission failed; answers stay as they were and the user may
    /// submit again.
    pub fn fail_submission(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(
            session = %self.session_id(),
            attempt = self.submission_attempts,
            error = %message,
            "assessment submission failed"
        );
        self.last_error = Some(message);
        if self.phase == Phase::Submitting {
            self.phase = Phase::Ready;
        }
    }

    // ===== Leaving =====

    /// Explicit user exit: stop the clock and discard the persisted copy.
    pub fn exit(&mut self) {
        self.cancel_countdown();
        if let Err(e) = loader::purge(self.storage.as_ref()) {
            warn!(session = %self.session_id(), error = %e, "failed to purge assessment on exit");
        }
    }

    /// Host teardown: stop the clock. The persisted snapshot is cleared only
    /// when the session was submitted, so an unfinished attempt can resume.
    pub fn teardown(&mut self) {
        self.cancel_countdown();
        if self.phase == Phase::Submitted
            && let Err(e) = loader::purge(self.storage.as_ref())
        {
            warn!(session = %self.session_id(), error = %e, "failed to purge assessment on teardown");
        }
    }
}

/// Remaining time at `now`, or [`FALLBACK_WINDOW`] if the deadline passed.
///
/// Rounded up to whole seconds.
pub fn remaining_at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0 {
        return FALLBACK_WINDOW;
    }
    Duration::from_secs((millis as u64).div_ceil(1000))
}
