//! Wire message envelope.

use galavote_types::{HostState, Program, ProgramId, VoterId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Full host-state snapshot as sent to voters.
///
/// Carries pre-aggregated per-program counts rather than the raw vote list:
/// the host stays sole owner of the raw records, and orphaned votes are
/// already excluded from the counts by id-miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// The full live program catalog, in display order.
    pub programs: Vec<Program>,
    /// Whether votes are currently accepted.
    pub is_active: bool,
    /// Votes per live program id.
    pub vote_counts: IndexMap<ProgramId, u64>,
}

impl StateSnapshot {
    /// Capture the host's current state for broadcast.
    pub fn capture(state: &HostState) -> Self {
        Self {
            programs: state.programs().cloned().collect(),
            is_active: state.is_active(),
            vote_counts: state.tally(),
        }
    }

    /// An empty snapshot with voting suspended.
    pub fn empty() -> Self {
        Self {
            programs: Vec::new(),
            is_active: false,
            vote_counts: IndexMap::new(),
        }
    }
}

/// The closed, discriminated set of protocol messages.
///
/// `Vote` is sent only by voters; `SyncState` only by the host. Anything
/// else on the wire fails decoding at the codec boundary and is dropped
/// there. JSON wire form is tagged on `kind`:
///
/// ```json
/// {"kind":"VOTE","programId":"3","voterId":"user_ab12"}
/// {"kind":"SYNC_STATE","programs":[...],"isActive":true,"voteCounts":{"3":1}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WireMessage {
    /// A voter's single vote submission.
    #[serde(rename = "VOTE", rename_all = "camelCase")]
    Vote {
        /// The program voted for.
        program_id: ProgramId,
        /// The submitting client's instance-scoped id.
        voter_id: VoterId,
    },

    /// Canonical-state push from the host.
    #[serde(rename = "SYNC_STATE")]
    SyncState(StateSnapshot),
}

impl WireMessage {
    /// Build a vote submission.
    pub fn vote(program_id: ProgramId, voter_id: VoterId) -> Self {
        WireMessage::Vote {
            program_id,
            voter_id,
        }
    }

    /// Build a state push from current host state.
    pub fn sync_state(state: &HostState) -> Self {
        WireMessage::SyncState(StateSnapshot::capture(state))
    }

    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireMessage::Vote { .. } => "VOTE",
            WireMessage::SyncState(_) => "SYNC_STATE",
        }
    }

    /// Check if this message may only originate from a voter.
    pub fn is_from_voter(&self) -> bool {
        matches!(self, WireMessage::Vote { .. })
    }

    /// Check if this message may only originate from the host.
    pub fn is_from_host(&self) -> bool {
        matches!(self, WireMessage::SyncState(_))
    }
}
