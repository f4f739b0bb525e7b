//! In-memory snapshot storage for simulations.

use galavote_types::{PersistedState, STORAGE_KEY};
use im::HashMap;

/// Keyed snapshot store with O(1) structural-sharing snapshots.
///
/// Cloning a `SimStorage` is cheap, so tests can capture the store's state
/// mid-run and compare against it later.
#[derive(Debug, Clone, Default)]
pub struct SimStorage {
    entries: HashMap<String, PersistedState>,
}

impl SimStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a snapshot under a key, replacing any previous value.
    pub fn store(&mut self, key: &str, snapshot: PersistedState) {
        self.entries.insert(key.to_owned(), snapshot);
    }

    /// Read a snapshot back.
    pub fn load(&self, key: &str) -> Option<&PersistedState> {
        self.entries.get(key)
    }

    /// The host snapshot under the fixed storage key.
    pub fn host_snapshot(&self) -> Option<&PersistedState> {
        self.load(STORAGE_KEY)
    }
}
