//! Timed assessment session.
//!
//! A session is seeded once, either from a payload handed over by in-app
//! navigation or from the snapshot persisted in [`ClientStorage`], and then
//! runs without the network until it is submitted or its time runs out.
//!
//! # Lifecycle
//!
//! ```text
//! Loading ──► Ready (answer ⇄ navigate) ──► Submitting ──► Submitted
//!    │          │                               │
//!    └──────────┴──► Invalid (purge + leave)    └──► Ready (on failure)
//! ```
//!
//! - Every answer change rewrites the persisted snapshot, so a reload
//!   resumes with the same questions and answers.
//! - When the countdown reaches zero the session auto-submits if anything
//!   was answered, and closes without submitting otherwise.
//! - The persisted snapshot is cleared on successful submission or explicit
//!   exit, never on plain teardown.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitesafe::assessment::{self, Command, GatewaySubmissionApi};
//! use sitesafe::{GatewayClient, MemoryStorage};
//! # use sitesafe::assessment::{Notice, SessionHost};
//! # struct Cli;
//! # #[async_trait::async_trait]
//! # impl SessionHost for Cli {
//! #     async fn notify(&self, notice: Notice) { println!("{notice}") }
//! #     async fn confirm_submission(&self, _: usize, _: usize) -> bool { true }
//! #     async fn leave(&self) {}
//! # }
//!
//! # async fn example(payload: serde_json::Value) -> sitesafe::Result<()> {
//! let storage = Arc::new(MemoryStorage::new());
//! let client = GatewayClient::builder().storage(storage.clone()).build()?;
//! let api = GatewaySubmissionApi::new(client);
//! let host = Cli;
//!
//! if let Some(session) = assessment::open_session(Some(payload), storage, &host).await {
//!     let (tx, rx) = tokio::sync::mpsc::channel(16);
//!     tx.send(Command::Select { question_id: "1".into(), option: "75".into() }).await.ok();
//!     tx.send(Command::Submit).await.ok();
//!     let exit = assessment::run_session(session, rx, &host, &api).await;
//!     println!("{exit:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`ClientStorage`]: crate::storage::ClientStorage

mod countdown;
mod host;
mod loader;
mod payload;
mod runner;
pub mod scoring;
mod session;
mod submit;

pub use countdown::{Countdown, TICK};
pub use host::{Notice, SessionHost};
pub use loader::{SessionSource, load_session, persist, purge};
pub use payload::{Answers, AssessmentPayload, Question, SessionInfo, Snapshot};
pub use runner::{Command, SessionExit, open_session, run_session};
pub use scoring::compute_score;
pub use session::{
    AssessmentSession, ExpiryAction, FALLBACK_WINDOW, Phase, TickOutcome, remaining_at,
};
pub use submit::{GatewaySubmissionApi, SubmissionApi, SubmissionRequest, SubmissionResponse};
