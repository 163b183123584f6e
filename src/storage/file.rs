//! Storage backed by one file per key in a directory.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::ClientStorage;
use crate::{Result, SiteSafeError};

/// File-backed [`ClientStorage`]: one file per key under `dir`.
///
/// Writes are atomic (tmp file + rename), so a crash mid-write leaves the
/// previous value in place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store items under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location: `<data dir>/sitesafe/storage`
    /// (e.g. `~/.local/share/sitesafe/storage`).
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("sitesafe")
            .join("storage")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

/// Map a storage key onto a safe file name.
fn file_name(key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{sanitized}.item")
}

impl ClientStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read storage item");
                Err(SiteSafeError::Storage(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            SiteSafeError::Storage(format!(
                "failed to create storage dir {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("item.tmp");
        std::fs::write(&tmp_path, value).map_err(|e| {
            SiteSafeError::Storage(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|e| {
            SiteSafeError::Storage(format!(
                "failed to rename {} → {}: {e}",
                tmp_path.display(),
                path.display()
            ))
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SiteSafeError::Storage(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}
