//! Temporary storage for manifest snapshots.
//!
//! Each workflow stores the manifest bytes it fetched under a fresh UUID and
//! carries only that UUID in its token. Two workflows on the same branch never
//! share a snapshot.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::workflow::error::WorkflowError;

const SNAPSHOT_EXTENSION: &str = "manifest";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a new snapshot and returns its locator.
    pub async fn put(&self, bytes: &[u8]) -> std::io::Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let id = Uuid::new_v4();
        tokio::fs::write(self.path_for(&id), bytes).await?;
        tracing::debug!(snapshot = %id, bytes = bytes.len(), "Stored manifest snapshot");
        Ok(id.to_string())
    }

    /// Loads a snapshot. Unset, malformed, or expired locators are an
    /// invalid transition: the token no longer points at usable state.
    pub async fn get(&self, locator: &str) -> Result<Vec<u8>, WorkflowError> {
        let id = Self::parse_locator(locator)?;
        match tokio::fs::read(self.path_for(&id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                WorkflowError::InvalidTransition(format!("manifest snapshot {id} has expired")),
            ),
            Err(e) => Err(WorkflowError::InvalidTransition(format!(
                "manifest snapshot {id} is unreadable: {e}"
            ))),
        }
    }

    /// Removes a snapshot once its workflow no longer needs it.
    pub async fn discard(&self, locator: &str) {
        let Ok(id) = Self::parse_locator(locator) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(self.path_for(&id)).await {
            tracing::debug!(snapshot = %id, error = %e, "Could not discard manifest snapshot");
        }
    }

    /// Deletes snapshots last modified at least `max_age` ago.
    /// Returns how many were removed.
    pub fn prune_older_than(&self, max_age: Duration) -> std::io::Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age >= max_age) && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    // Only UUIDs are accepted so a token cannot name an arbitrary file.
    fn parse_locator(locator: &str) -> Result<Uuid, WorkflowError> {
        if locator.is_empty() {
            return Err(WorkflowError::InvalidTransition(
                "workflow has no manifest snapshot".to_string(),
            ));
        }
        Uuid::parse_str(locator).map_err(|_| {
            WorkflowError::InvalidTransition(format!("`{locator}` is not a manifest snapshot"))
        })
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.{SNAPSHOT_EXTENSION}"))
    }
}
