//! Snapshot persistence for the host.
//!
//! The host persists its full `{programs, votes}` state after every
//! mutation so a restart picks up where the gala left off. Corrupt or
//! missing data is never fatal: the host logs and starts empty.

use galavote_types::{PersistedState, STORAGE_KEY};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Errors writing a snapshot. Reads never error; see [`SnapshotStore::load`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io error: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable storage for the host snapshot.
pub trait SnapshotStore: Send {
    /// Read the stored snapshot. Returns `None` when nothing usable is
    /// stored; implementations log corruption instead of surfacing it.
    fn load(&self) -> Option<PersistedState>;

    /// Replace the stored snapshot.
    fn store(&self, snapshot: &PersistedState) -> Result<(), StoreError>;
}

/// JSON file store writing `<dir>/galavote_data_v1.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store snapshots under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// The file this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Option<PersistedState> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "snapshot unreadable, starting empty");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "snapshot corrupt, starting empty");
                None
            }
        }
    }

    fn store(&self, snapshot: &PersistedState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        // Write-then-rename so a crash mid-write never corrupts the
        // previous snapshot.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<PersistedState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a snapshot.
    pub fn with_snapshot(snapshot: PersistedState) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Option<PersistedState> {
        match self.snapshot.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, snapshot: &PersistedState) -> Result<(), StoreError> {
        let mut guard = match self.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(snapshot.clone());
        Ok(())
    }
}
