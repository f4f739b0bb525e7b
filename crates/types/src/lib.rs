//! Core types for the GalaVote host–voter sync protocol.
//!
//! Everything here is plain data: identifiers, the program catalog, vote
//! records, and the host's canonical state with its pure update operations.
//! No I/O and no async: state machines in other crates own instances of
//! these types and mutate them in reaction to events.

mod identifiers;
mod persist;
mod program;
mod state;
mod vote;

pub use identifiers::{ConnectionId, PeerIdentity, ProgramId, VoterId};
pub use persist::{PersistedState, STORAGE_KEY};
pub use program::{Program, ProgramDraft};
pub use state::{HostState, SessionPhase, VoteOutcome};
pub use vote::VoteRecord;
