//! Resolve the session payload from its two possible sources.
//!
//! Priority: a payload handed over directly (in-app navigation) wins over
//! the snapshot persisted in client storage. A direct payload is persisted
//! immediately so a later reload can recover it; a failed write is logged
//! and the session still loads. When neither source yields a valid payload
//! the persisted data is purged and the caller gets
//! [`SiteSafeError::InvalidSession`].

use tracing::{info, warn};

use super::payload::{AssessmentPayload, Snapshot};
use crate::storage::{ClientStorage, keys};
use crate::{Result, SiteSafeError};

/// Where a loaded session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Navigation,
    Storage,
}

/// Resolve a session from `candidate` or, failing that, from storage.
pub fn load_session(
    candidate: Option<serde_json::Value>,
    storage: &dyn ClientStorage,
) -> Result<(Snapshot, SessionSource)> {
    match resolve(candidate, storage) {
        Ok(found) => Ok(found),
        Err(e) => {
            warn!(error = %e, "assessment session unavailable; purging persisted copy");
            if let Err(purge_err) = purge(storage) {
                warn!(error = %purge_err, "failed to purge persisted assessment");
            }
            Err(e)
        }
    }
}

fn resolve(
    candidate: Option<serde_json::Value>,
    storage: &dyn ClientStorage,
) -> Result<(Snapshot, SessionSource)> {
    if let Some(value) = candidate {
        let payload = AssessmentPayload::from_value(value)?;
        let mut snapshot = Snapshot::new(payload);

        // Re-entering the same session keeps the answers recorded so far.
        if let Some(previous) = read_persisted(storage)
            && previous.payload.session.id == snapshot.payload.session.id
        {
            snapshot.answers = previous
                .answers
                .into_iter()
                .filter(|(id, _)| snapshot.payload.has_question(id))
                .collect();
        }

        if let Err(e) = persist(storage, &snapshot) {
            warn!(session = %snapshot.payload.session.id, error = %e, "failed to persist assessment; reload will not resume it");
        }
        info!(session = %snapshot.payload.session.id, "assessment session loaded from navigation");
        return Ok((snapshot, SessionSource::Navigation));
    }

    let raw = storage
        .get_item(keys::CURRENT_ASSESSMENT)?
        .ok_or_else(|| SiteSafeError::InvalidSession("no assessment session available".into()))?;
    let snapshot = Snapshot::from_json(&raw)?;
    info!(
        session = %snapshot.payload.session.id,
        answered = snapshot.answers.len(),
        "assessment session restored from storage"
    );
    Ok((snapshot, SessionSource::Storage))
}

fn read_persisted(storage: &dyn ClientStorage) -> Option<Snapshot> {
    let raw = storage.get_item(keys::CURRENT_ASSESSMENT).ok()??;
    Snapshot::from_json(&raw).ok()
}

/// Write `snapshot` under the assessment storage key.
pub fn persist(storage: &dyn ClientStorage, snapshot: &Snapshot) -> Result<()> {
    storage.set_item(keys::CURRENT_ASSESSMENT, &snapshot.to_json()?)
}

/// Remove the persisted assessment.
pub fn purge(storage: &dyn ClientStorage) -> Result<()> {
    storage.remove_item(keys::CURRENT_ASSESSMENT)
}
