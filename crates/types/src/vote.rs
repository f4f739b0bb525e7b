//! Vote records.

use crate::{ProgramId, VoterId};
use serde::{Deserialize, Serialize};

/// One accepted vote, as recorded by the host.
///
/// Append-only: records are never mutated and never removed except by an
/// explicit reset-all. `program_id` may dangle if the program was deleted
/// later; dangling records are excluded from tallies by id-miss, not erased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    /// The program voted for.
    pub program_id: ProgramId,
    /// Host-assigned wall-clock timestamp, milliseconds.
    pub timestamp: u64,
    /// The submitting client's opaque id.
    pub voter_id: VoterId,
}

impl VoteRecord {
    /// Create a record with a host-assigned timestamp.
    pub fn new(program_id: ProgramId, voter_id: VoterId, timestamp: u64) -> Self {
        Self {
            program_id,
            timestamp,
            voter_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_record_wire_field_names() {
        let record = VoteRecord::new(ProgramId::new("3"), VoterId::new("user_ab"), 1_000);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["programId"], "3");
        assert_eq!(json["voterId"], "user_ab");
        assert_eq!(json["timestamp"], 1_000);
    }
}
