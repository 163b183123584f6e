//! SiteSafe - client core for the SiteSafe Pro workplace-safety platform
//!
//! This crate provides the [`GatewayClient`], the single choke point every
//! call to the SiteSafe API goes through (auth, response cache, 429 retry,
//! timeout normalization), and the timed [`assessment`] session that drives
//! a quiz attempt from load to submission.
//!
//! # Gateway Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitesafe::{ClientStorage, GatewayClient, MemoryStorage, storage::keys};
//!
//! #[tokio::main]
//! async fn main() -> sitesafe::Result<()> {
//!     let storage = Arc::new(MemoryStorage::new());
//!     storage.set_item(keys::TOKEN, "eyJhbGciOi...")?;
//!
//!     let client = GatewayClient::builder()
//!         .base_url("https://sitesafe.example/api")
//!         .storage(storage)
//!         .build()?;
//!
//!     // Served from cache on the second call within five minutes.
//!     let courses = client.get("/courses", &[("active", "true")]).await?;
//!     let again = client.get("/courses", &[("active", "true")]).await?;
//!     assert_eq!(courses, again);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sitesafe::{Config, FileStorage, GatewayClient};
//!
//! # fn main() -> sitesafe::Result<()> {
//! let config = Config::load(None)?;
//! let storage = Arc::new(FileStorage::new(config.storage_dir()));
//! let client = GatewayClient::from_config(config.gateway_config(), storage)?;
//! println!("talking to {}", client.base_url());
//! # Ok(())
//! # }
//! ```

pub mod assessment;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod storage;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use config::Config;
pub use error::{Result, SiteSafeError};
pub use gateway::{GatewayClient, GatewayClientBuilder, GatewayConfig, RequestOptions, RetryPolicy};
pub use version::{PKG_VERSION, version_string};

pub use cache::{CacheStore, CachedEntry, MemoryCacheStore, cache_key};
pub use storage::{ClientStorage, FileStorage, MemoryStorage, Role, UserProfile};

pub use assessment::{
    AssessmentPayload, AssessmentSession, Command, GatewaySubmissionApi, Notice, Question,
    SessionExit, SessionHost, SubmissionApi, SubmissionRequest, SubmissionResponse,
};
