//! Persisted host snapshot.

use crate::{Program, VoteRecord};
use serde::{Deserialize, Serialize};

/// Fixed key under which the host snapshot is stored.
///
/// Kept stable across versions of the host process so a restart picks up
/// the previous gala's programs and votes.
pub const STORAGE_KEY: &str = "galavote_data_v1";

/// Durable host state, written after every mutating operation and loaded
/// at startup.
///
/// The voting-session flag is deliberately absent: a restarted host always
/// comes back up with voting suspended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Program catalog at save time.
    pub programs: Vec<Program>,
    /// All accepted vote records, including orphaned ones.
    pub votes: Vec<VoteRecord>,
}
