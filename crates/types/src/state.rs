//! Canonical host state and its pure update operations.

use crate::{PersistedState, Program, ProgramDraft, ProgramId, VoteRecord, VoterId};
use indexmap::IndexMap;

/// Coarse session phase, derived from the canonical state.
///
/// Transitions are driven only by explicit administrative commands
/// (`add_program`, `delete_program`, `set_voting`); there is no terminal
/// phase short of process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No programs configured yet.
    Idle,
    /// Voting open.
    Active,
    /// Programs exist but voting is closed.
    Suspended,
}

/// Outcome of attempting to record one vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote appended; state changed.
    Recorded,
    /// This voter already has a counted vote. First write wins; no-op.
    Duplicate,
    /// The program id does not reference a live program.
    UnknownProgram(ProgramId),
    /// Voting is not currently open.
    VotingClosed,
}

impl VoteOutcome {
    /// Whether the vote changed canonical state (and so requires a
    /// persist + broadcast cycle).
    pub fn state_changed(&self) -> bool {
        matches!(self, VoteOutcome::Recorded)
    }
}

/// The host's canonical voting state.
///
/// A single owned value; all mutation goes through the operations below,
/// which are synchronous and perform no I/O. The host state machine decides
/// when to persist and broadcast based on their return values.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Live programs, in insertion (display) order.
    programs: IndexMap<ProgramId, Program>,
    /// Accepted votes, append-only. May reference deleted programs.
    votes: Vec<VoteRecord>,
    /// Whether new votes are accepted.
    is_active: bool,
    /// Next program id to assign.
    next_program_id: u64,
}

impl HostState {
    /// Create an empty state with voting suspended.
    pub fn new() -> Self {
        Self {
            programs: IndexMap::new(),
            votes: Vec::new(),
            is_active: false,
            next_program_id: 1,
        }
    }

    /// Restore state from a persisted snapshot.
    ///
    /// Voting always restarts suspended. The id counter resumes past the
    /// highest numeric id present so restored and new programs never clash.
    pub fn from_persisted(persisted: PersistedState) -> Self {
        let next_program_id = persisted
            .programs
            .iter()
            .filter_map(|p| p.id.as_str().parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        Self {
            programs: persisted
                .programs
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            votes: persisted.votes,
            is_active: false,
            next_program_id,
        }
    }

    /// Snapshot the durable portion of the state.
    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            programs: self.programs.values().cloned().collect(),
            votes: self.votes.clone(),
        }
    }

    /// Current session phase.
    pub fn phase(&self) -> SessionPhase {
        if self.programs.is_empty() {
            SessionPhase::Idle
        } else if self.is_active {
            SessionPhase::Active
        } else {
            SessionPhase::Suspended
        }
    }

    /// Whether votes are currently accepted.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Live programs in display order.
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }

    /// Look up a live program.
    pub fn program(&self, id: &ProgramId) -> Option<&Program> {
        self.programs.get(id)
    }

    /// Number of live programs.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// All accepted vote records, including orphaned ones.
    pub fn votes(&self) -> &[VoteRecord] {
        &self.votes
    }

    /// Per-program vote counts over *live* programs only.
    ///
    /// Every live program appears, zero-counted if necessary. Votes for
    /// deleted programs are excluded by id-miss; the records themselves
    /// survive in `votes()`.
    pub fn tally(&self) -> IndexMap<ProgramId, u64> {
        let mut counts: IndexMap<ProgramId, u64> =
            self.programs.keys().map(|id| (id.clone(), 0)).collect();
        for vote in &self.votes {
            if let Some(count) = counts.get_mut(&vote.program_id) {
                *count += 1;
            }
        }
        counts
    }

    /// Flip the voting gate, returning the new value.
    pub fn toggle_voting(&mut self) -> bool {
        self.is_active = !self.is_active;
        self.is_active
    }

    /// Add a program, assigning it the next id. Returns the new program.
    pub fn add_program(&mut self, draft: ProgramDraft) -> &Program {
        let id = ProgramId::new(self.next_program_id.to_string());
        self.next_program_id += 1;
        let program = draft.into_program(id.clone());
        self.programs.insert(id.clone(), program);
        &self.programs[&id]
    }

    /// Delete a program. Returns whether it existed.
    ///
    /// Stated policy: the program's votes are *not* erased. They become
    /// orphaned records that future tallies skip.
    pub fn delete_program(&mut self, id: &ProgramId) -> bool {
        self.programs.shift_remove(id).is_some()
    }

    /// Record one vote, applying the gate, liveness, and dedup rules.
    ///
    /// Gate and liveness are checked before dedup so a suspended session
    /// never consumes a voter's single vote.
    pub fn record_vote(
        &mut self,
        program_id: ProgramId,
        voter_id: VoterId,
        timestamp: u64,
    ) -> VoteOutcome {
        if !self.is_active {
            return VoteOutcome::VotingClosed;
        }
        if !self.programs.contains_key(&program_id) {
            return VoteOutcome::UnknownProgram(program_id);
        }
        if self.votes.iter().any(|v| v.voter_id == voter_id) {
            return VoteOutcome::Duplicate;
        }
        self.votes
            .push(VoteRecord::new(program_id, voter_id, timestamp));
        VoteOutcome::Recorded
    }

    /// Clear all vote records. Idempotent.
    pub fn reset_votes(&mut self) {
        self.votes.clear();
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}
