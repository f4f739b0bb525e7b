//! Inbound events for the sync state machines.

use galavote_messages::{StateSnapshot, WireMessage};
use galavote_types::{ConnectionId, PeerIdentity, ProgramDraft, ProgramId, VoterId};

use crate::TimerKind;

/// Administrative commands accepted by the host.
///
/// These are the only drivers of session-phase transitions; nothing a voter
/// sends can open or close voting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Flip the voting gate.
    ToggleVoting,
    /// Add a program to the catalog.
    AddProgram(ProgramDraft),
    /// Delete a program. Its votes are orphaned, not erased.
    DeleteProgram(ProgramId),
    /// Clear all vote records.
    ResetVotes,
}

/// Events processed by the sync state machines.
///
/// Each event is delivered exactly once and processed to completion before
/// the next; event-loop serialization is the only synchronization in the
/// protocol.
#[derive(Debug, Clone)]
pub enum Event {
    /// Caller asked the voter to dial the host. Voter only.
    ConnectRequested {
        /// The host's rendezvous identity.
        host: PeerIdentity,
    },

    /// A connection reached the open state. On the host this is an accepted
    /// inbound connection; on the voter, its single outbound one.
    ConnectionOpened {
        /// The connection that opened.
        conn: ConnectionId,
    },

    /// A connection closed, or a send on it failed.
    ConnectionClosed {
        /// The connection that closed.
        conn: ConnectionId,
    },

    /// A connection attempt or established connection errored.
    ConnectionFailed {
        /// The affected connection.
        conn: ConnectionId,
        /// Transport-provided description, for logs only.
        reason: String,
    },

    /// A `VOTE` message arrived. Host only.
    VoteReceived {
        /// The connection it arrived on.
        conn: ConnectionId,
        /// The program voted for.
        program_id: ProgramId,
        /// The sender's voter id.
        voter_id: VoterId,
    },

    /// A `SYNC_STATE` message arrived. Voter only.
    SyncStateReceived {
        /// The connection it arrived on.
        conn: ConnectionId,
        /// The pushed snapshot.
        snapshot: StateSnapshot,
    },

    /// Caller asked the voter to submit its vote. Voter only.
    SubmitVote {
        /// The chosen program.
        program_id: ProgramId,
    },

    /// Administrative command. Host only.
    Admin(AdminCommand),

    /// A previously set timer fired.
    TimerFired {
        /// Which timer.
        timer: TimerKind,
    },
}

impl Event {
    /// Map a decoded wire message into the event it induces.
    ///
    /// The runner calls this after the codec accepts a payload; role
    /// mismatches (a voter receiving `VOTE`, the host receiving
    /// `SYNC_STATE`) are left to the machines, which drop them with a log.
    pub fn from_message(conn: ConnectionId, message: WireMessage) -> Self {
        match message {
            WireMessage::Vote {
                program_id,
                voter_id,
            } => Event::VoteReceived {
                conn,
                program_id,
                voter_id,
            },
            WireMessage::SyncState(snapshot) => Event::SyncStateReceived { conn, snapshot },
        }
    }

    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ConnectRequested { .. } => "ConnectRequested",
            Event::ConnectionOpened { .. } => "ConnectionOpened",
            Event::ConnectionClosed { .. } => "ConnectionClosed",
            Event::ConnectionFailed { .. } => "ConnectionFailed",
            Event::VoteReceived { .. } => "VoteReceived",
            Event::SyncStateReceived { .. } => "SyncStateReceived",
            Event::SubmitVote { .. } => "SubmitVote",
            Event::Admin(_) => "Admin",
            Event::TimerFired { .. } => "TimerFired",
        }
    }
}
