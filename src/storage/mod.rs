//! Durable client-side storage.
//!
//! [`ClientStorage`] is the string key/value store the client persists
//! state into between runs: the bearer credential, the last-known profile
//! snapshot, and the in-progress assessment. Two implementations ship:
//!
//! - [`MemoryStorage`]: process-local map, for tests and embedding.
//! - [`FileStorage`]: one file per key under a directory, survives restarts.
//!
//! Writers are confined: the credential and profile keys are written by the
//! login flow, the assessment key only by the assessment session.

mod file;
mod memory;
pub mod profile;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use profile::{Role, UserProfile};

use crate::Result;

/// Well-known storage keys.
pub mod keys {
    /// Bearer credential attached to every outbound request.
    pub const TOKEN: &str = "token";
    /// Last-known user profile snapshot (JSON).
    pub const USER: &str = "user";
    /// Serialized in-progress assessment snapshot (JSON).
    pub const CURRENT_ASSESSMENT: &str = "currentAssessment";
}

/// String key/value store that outlives a single client session.
pub trait ClientStorage: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write (or overwrite) a value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Deleting an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;
}
