//! End-to-end tests for the timed assessment session.
//!
//! A recording host and a scripted submission backend stand in for the view
//! and the API; the countdown runs on paused tokio time where it matters.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;

use sitesafe::assessment::{
    self, Command, FALLBACK_WINDOW, GatewaySubmissionApi, Notice, SessionExit, SessionHost,
    SessionSource, SubmissionApi, SubmissionRequest, SubmissionResponse,
};
use sitesafe::storage::keys;
use sitesafe::{ClientStorage, GatewayClient, MemoryStorage, Question, Result, SiteSafeError};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct RecordingHost {
    confirm: bool,
    notices: Mutex<Vec<Notice>>,
    confirmations: Mutex<Vec<(usize, usize)>>,
    questions_shown: Mutex<Vec<usize>>,
    left: Mutex<u32>,
}

impl RecordingHost {
    fn confirming() -> Self {
        Self {
            confirm: true,
            ..Self::default()
        }
    }

    fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    fn left(&self) -> u32 {
        *self.left.lock().unwrap()
    }
}

#[async_trait]
impl SessionHost for RecordingHost {
    async fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    async fn confirm_submission(&self, answered: usize, total: usize) -> bool {
        self.confirmations.lock().unwrap().push((answered, total));
        self.confirm
    }

    async fn leave(&self) {
        *self.left.lock().unwrap() += 1;
    }

    async fn on_question(&self, index: usize, _question: &Question) {
        self.questions_shown.lock().unwrap().push(index);
    }
}

/// Answers submissions from a script; succeeds once the script runs out.
#[derive(Default)]
struct ScriptedApi {
    script: Mutex<VecDeque<Result<SubmissionResponse>>>,
    calls: Mutex<Vec<(String, SubmissionRequest)>>,
}

impl ScriptedApi {
    fn with_script(script: Vec<Result<SubmissionResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, SubmissionRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionApi for ScriptedApi {
    async fn submit(
        &self,
        session_id: &str,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((session_id.to_string(), request.clone()));
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(SubmissionResponse {
                success: true,
                ..Default::default()
            })
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn payload_due_in(secs: i64) -> serde_json::Value {
    let deadline = Utc::now() + chrono::Duration::seconds(secs);
    json!({
        "session": {"id": 42, "deadline": deadline.to_rfc3339(), "is_retake": false},
        "course": {"id": 3, "title": "Working at Heights"},
        "enrollment": {"id": 11},
        "questionBank": {"id": 5},
        "questions": [
            {"id": 1, "text": "Max ladder angle?", "options": ["60", "75"], "points": 1},
            {"id": 2, "text": "Harness inspection?", "options": ["Daily", "Weekly"], "points": 2},
            {"id": 3, "text": "Edge protection height?", "options": ["0.9m", "1.1m"], "points": 3}
        ]
    })
}

fn select(question_id: &str, option: &str) -> Command {
    Command::Select {
        question_id: question_id.into(),
        option: option.into(),
    }
}

async fn commands(cmds: Vec<Command>) -> (mpsc::Sender<Command>, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(cmds.len().max(1));
    for cmd in cmds {
        tx.send(cmd).await.unwrap();
    }
    (tx, rx)
}

fn stored_snapshot(storage: &MemoryStorage) -> Option<String> {
    storage.get_item(keys::CURRENT_ASSESSMENT).unwrap()
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn answered_questions_score_their_points() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::confirming();
    let api = ScriptedApi::default();

    let session = assessment::open_session(Some(payload_due_in(1800)), storage.clone(), &host)
        .await
        .expect("session should open");
    let (_tx, rx) = commands(vec![select("1", "75"), select("3", "1.1m"), Command::Submit]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;

    assert_eq!(
        exit,
        SessionExit::Submitted {
            score: 4.0,
            total: 6.0
        }
    );
    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    let (session_id, request) = &calls[0];
    assert_eq!(session_id, "42");
    assert_eq!(request.score, 4.0);
    assert_eq!(request.answers.len(), 2);
    assert_eq!(serde_json::to_value(request).unwrap()["score"], json!(4));

    assert_eq!(*host.confirmations.lock().unwrap(), vec![(2, 3)]);
    assert!(host.notices().contains(&Notice::Submitted {
        score: 4.0,
        total: 6.0
    }));
    assert_eq!(host.left(), 1);
    assert_eq!(stored_snapshot(&storage), None);
}

#[tokio::test]
async fn server_score_takes_precedence_for_display() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::confirming();
    let api = ScriptedApi::with_script(vec![Ok(SubmissionResponse {
        success: true,
        message: None,
        score: Some(1.0),
        total_points: Some(6.0),
    })]);

    let session = assessment::open_session(Some(payload_due_in(600)), storage, &host)
        .await
        .unwrap();
    let (_tx, rx) = commands(vec![select("1", "60"), select("3", "0.9m"), Command::Submit]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;
    assert_eq!(
        exit,
        SessionExit::Submitted {
            score: 1.0,
            total: 6.0
        }
    );
}

#[tokio::test]
async fn submit_with_no_answers_never_reaches_backend() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::confirming();
    let api = ScriptedApi::default();

    let session = assessment::open_session(Some(payload_due_in(600)), storage.clone(), &host)
        .await
        .unwrap();
    let (_tx, rx) = commands(vec![Command::Submit, Command::Exit]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;

    assert_eq!(exit, SessionExit::Exited);
    assert!(api.calls().is_empty());
    assert!(host.confirmations.lock().unwrap().is_empty());
    assert_eq!(host.notices(), vec![Notice::NoAnswers]);
    // Explicit exit discards the attempt.
    assert_eq!(stored_snapshot(&storage), None);
}

#[tokio::test]
async fn declined_confirmation_keeps_session_open() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::default();
    let api = ScriptedApi::default();

    let session = assessment::open_session(Some(payload_due_in(600)), storage.clone(), &host)
        .await
        .unwrap();
    let (tx, rx) = commands(vec![select("2", "Daily"), Command::Submit]).await;
    drop(tx);

    let exit = assessment::run_session(session, rx, &host, &api).await;

    assert_eq!(exit, SessionExit::Detached);
    assert!(api.calls().is_empty());
    assert_eq!(*host.confirmations.lock().unwrap(), vec![(1, 3)]);
    // Teardown without submission leaves the snapshot for resume.
    assert!(stored_snapshot(&storage).unwrap().contains("Daily"));
}

#[tokio::test]
async fn failed_submission_can_be_retried_by_user() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::confirming();
    let api = ScriptedApi::with_script(vec![Err(SiteSafeError::Api {
        status: 503,
        body: json!({"detail": "Service unavailable"}),
    })]);

    let session = assessment::open_session(Some(payload_due_in(600)), storage.clone(), &host)
        .await
        .unwrap();
    let (_tx, rx) = commands(vec![select("2", "Weekly"), Command::Submit, Command::Submit]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;

    assert_eq!(
        exit,
        SessionExit::Submitted {
            score: 2.0,
            total: 6.0
        }
    );
    assert_eq!(api.calls().len(), 2);
    assert_eq!(
        host.notices()[0],
        Notice::SubmissionFailed {
            message: "Service unavailable".into()
        }
    );
    assert_eq!(stored_snapshot(&storage), None);
}

#[tokio::test]
async fn rejected_submission_is_reported() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::confirming();
    let api = ScriptedApi::with_script(vec![Ok(SubmissionResponse {
        success: false,
        message: Some("Session already closed".into()),
        ..Default::default()
    })]);

    let session = assessment::open_session(Some(payload_due_in(600)), storage.clone(), &host)
        .await
        .unwrap();
    let (tx, rx) = commands(vec![select("1", "75"), Command::Submit]).await;
    drop(tx);

    let exit = assessment::run_session(session, rx, &host, &api).await;

    assert_eq!(exit, SessionExit::Detached);
    assert_eq!(
        host.notices(),
        vec![Notice::Rejected {
            message: "Session already closed".into()
        }]
    );
    assert_eq!(host.left(), 0);
    assert!(stored_snapshot(&storage).is_some());
}

// ============================================================================
// Expiry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn expiry_with_answers_submits_without_confirmation() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::default();
    let api = ScriptedApi::default();

    let session = assessment::open_session(Some(payload_due_in(3)), storage.clone(), &host)
        .await
        .unwrap();
    // Keep the sender alive so the session runs until the countdown ends.
    let (_tx, rx) = commands(vec![select("2", "Daily")]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;

    assert_eq!(
        exit,
        SessionExit::Submitted {
            score: 2.0,
            total: 6.0
        }
    );
    assert_eq!(api.calls().len(), 1);
    assert!(host.confirmations.lock().unwrap().is_empty());
    assert_eq!(stored_snapshot(&storage), None);
}

#[tokio::test(start_paused = true)]
async fn expiry_without_answers_closes_without_submitting() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::confirming();
    let api = ScriptedApi::default();

    let session = assessment::open_session(Some(payload_due_in(2)), storage.clone(), &host)
        .await
        .unwrap();
    let (_tx, rx) = commands(vec![]).await;

    let start = tokio::time::Instant::now();
    let exit = assessment::run_session(session, rx, &host, &api).await;

    assert_eq!(exit, SessionExit::ClosedUnanswered);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(api.calls().is_empty());
    assert_eq!(host.notices(), vec![Notice::ClosingUnanswered]);
    assert_eq!(host.left(), 1);
}

// ============================================================================
// Loading and resume
// ============================================================================

#[tokio::test]
async fn missing_session_redirects_away() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::default();

    let session = assessment::open_session(None, storage, &host).await;

    assert!(session.is_none());
    assert!(matches!(
        host.notices().as_slice(),
        [Notice::SessionUnavailable { .. }]
    ));
    assert_eq!(host.left(), 1);
}

#[tokio::test]
async fn malformed_payload_purges_storage_and_redirects() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::default();
    assessment::open_session(Some(payload_due_in(600)), storage.clone(), &host)
        .await
        .unwrap();
    assert!(stored_snapshot(&storage).is_some());

    let broken = json!({"session": {"id": 42}, "questions": []});
    let session = assessment::open_session(Some(broken), storage.clone(), &host).await;

    assert!(session.is_none());
    assert_eq!(stored_snapshot(&storage), None);
    assert_eq!(host.left(), 1);
}

#[tokio::test]
async fn reload_resumes_questions_answers_and_deadline() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::default();
    let api = ScriptedApi::default();

    let session = assessment::open_session(Some(payload_due_in(1200)), storage.clone(), &host)
        .await
        .unwrap();
    let deadline = session.deadline();
    let (tx, rx) = commands(vec![select("1", "75"), select("3", "1.1m")]).await;
    drop(tx);
    assert_eq!(
        assessment::run_session(session, rx, &host, &api).await,
        SessionExit::Detached
    );

    // Reload: no navigation payload.
    let resumed = assessment::open_session(None, storage.clone(), &host)
        .await
        .expect("stored session should resume");

    assert_eq!(resumed.source(), SessionSource::Storage);
    assert_eq!(resumed.session_id(), "42");
    assert_eq!(resumed.total_questions(), 3);
    assert_eq!(resumed.answers().get("1").map(String::as_str), Some("75"));
    assert_eq!(resumed.answers().get("3").map(String::as_str), Some("1.1m"));
    assert_eq!(resumed.deadline(), deadline);
    assert!(resumed.remaining() <= Duration::from_secs(1200));
    assert!(resumed.remaining() > Duration::from_secs(1100));
}

#[tokio::test]
async fn reload_after_deadline_grants_fallback_window() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::default();

    let session = assessment::open_session(Some(payload_due_in(-60)), storage.clone(), &host)
        .await
        .unwrap();
    assert_eq!(session.remaining(), FALLBACK_WINDOW);
    drop(session);

    let resumed = assessment::open_session(None, storage, &host).await.unwrap();
    assert_eq!(resumed.remaining(), Duration::from_secs(2 * 60 * 60));
}

#[tokio::test]
async fn navigation_is_reported_to_host() {
    let storage = Arc::new(MemoryStorage::new());
    let host = RecordingHost::default();
    let api = ScriptedApi::default();

    let session = assessment::open_session(Some(payload_due_in(600)), storage, &host)
        .await
        .unwrap();
    let (tx, rx) = commands(vec![
        Command::Previous,
        Command::Next,
        Command::Next,
        Command::Next,
        Command::JumpTo(0),
        Command::JumpTo(9),
    ])
    .await;
    drop(tx);

    assessment::run_session(session, rx, &host, &api).await;

    // Initial display, then only the moves that changed the question.
    assert_eq!(*host.questions_shown.lock().unwrap(), vec![0, 1, 2, 0]);
}

// ============================================================================
// Gateway-backed submission
// ============================================================================

#[tokio::test]
async fn gateway_submission_posts_to_session_resource() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quiz-sessions/42/submit"))
        .and(body_partial_json(json!({
            "answers": {"1": "75", "3": "1.1m"},
            "score": 4
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "score": 4,
            "total_points": 6
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let client = GatewayClient::builder()
        .base_url(server.uri())
        .storage(storage.clone())
        .build()
        .unwrap();
    let api = GatewaySubmissionApi::new(client);
    let host = RecordingHost::confirming();

    let session = assessment::open_session(Some(payload_due_in(600)), storage, &host)
        .await
        .unwrap();
    let (_tx, rx) = commands(vec![select("1", "75"), select("3", "1.1m"), Command::Submit]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;
    assert_eq!(
        exit,
        SessionExit::Submitted {
            score: 4.0,
            total: 6.0
        }
    );

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["completion_time"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn gateway_acknowledgment_with_decimal_string_score_completes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quiz-sessions/42/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "score": "1.00",
            "total_points": "6.00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let client = GatewayClient::builder()
        .base_url(server.uri())
        .storage(storage.clone())
        .build()
        .unwrap();
    let api = GatewaySubmissionApi::new(client);
    let host = RecordingHost::confirming();

    let session = assessment::open_session(Some(payload_due_in(600)), storage.clone(), &host)
        .await
        .unwrap();
    let (_tx, rx) = commands(vec![select("1", "75"), Command::Submit]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;
    assert_eq!(
        exit,
        SessionExit::Submitted {
            score: 1.0,
            total: 6.0
        }
    );
    assert_eq!(stored_snapshot(&storage), None);
}

#[tokio::test]
async fn gateway_empty_acknowledgment_completes_with_client_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quiz-sessions/42/submit"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let client = GatewayClient::builder()
        .base_url(server.uri())
        .storage(storage.clone())
        .build()
        .unwrap();
    let api = GatewaySubmissionApi::new(client);
    let host = RecordingHost::confirming();

    let session = assessment::open_session(Some(payload_due_in(600)), storage.clone(), &host)
        .await
        .unwrap();
    let (_tx, rx) = commands(vec![select("2", "Daily"), Command::Submit]).await;

    let exit = assessment::run_session(session, rx, &host, &api).await;
    assert_eq!(
        exit,
        SessionExit::Submitted {
            score: 2.0,
            total: 6.0
        }
    );
    assert_eq!(stored_snapshot(&storage), None);
}
