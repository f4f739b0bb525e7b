//! Notifications surfaced to the embedding caller.

use galavote_messages::StateSnapshot;
use galavote_types::{ConnectionId, ProgramId, VoterId};
use thiserror::Error;

/// Why the host refused to count a vote.
///
/// Duplicates are deliberately absent: a repeat vote is a silent no-op, not
/// a rejection. There is no in-protocol rejection message back to the
/// voter; these reach the host's own UI only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteRejectReason {
    #[error("vote for unknown or deleted program {0}")]
    UnknownProgram(ProgramId),

    #[error("voting is not open")]
    VotingClosed,
}

/// Why the voter machine refused to send a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("not connected to the host")]
    NotConnected,

    #[error("still waiting for the host's initial snapshot")]
    AwaitingSnapshot,

    #[error("this client has already voted")]
    AlreadyVoted,
}

/// Events of interest to whatever embeds a machine: the admin dashboard on
/// the host, the voting page on a client, or a test harness.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Host: a voter connection was registered.
    VoterConnected {
        /// The registered connection.
        conn: ConnectionId,
    },

    /// Host: a voter connection was pruned from the registry.
    VoterDisconnected {
        /// The pruned connection.
        conn: ConnectionId,
    },

    /// Host: a vote was counted.
    VoteAccepted {
        /// The program voted for.
        program_id: ProgramId,
        /// Who voted.
        voter_id: VoterId,
    },

    /// Host: a vote was dropped. Observability only; nothing is sent back.
    VoteRejected {
        /// The connection it arrived on.
        conn: ConnectionId,
        /// Why it was dropped.
        reason: VoteRejectReason,
    },

    /// Voter: a snapshot was applied. `first` marks the transition into the
    /// ready-to-vote state.
    SnapshotApplied {
        /// The applied snapshot.
        snapshot: StateSnapshot,
        /// Whether this was the initial snapshot after connecting.
        first: bool,
    },

    /// Voter: the vote was handed to the transport. Optimistic; there is no
    /// host acknowledgment in the protocol.
    VoteSubmitted {
        /// The chosen program.
        program_id: ProgramId,
    },

    /// Voter: a submit attempt was refused locally.
    SubmitFailed {
        /// Why.
        reason: SubmitError,
    },

    /// Voter: could not reach the ready state. Not retried automatically;
    /// recovery is a fresh connect request from the caller.
    ConnectFailed {
        /// Transport-provided description, or "timed out".
        reason: String,
    },

    /// Voter: the established connection dropped.
    Disconnected {
        /// Whether the vote had already been sent. A voted client stays
        /// voted; an unvoted one needs a fresh connect request.
        had_voted: bool,
    },
}
