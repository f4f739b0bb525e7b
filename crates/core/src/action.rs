//! Outbound actions requested by the sync state machines.

use galavote_messages::WireMessage;
use galavote_types::{ConnectionId, PeerIdentity, PersistedState};
use std::time::Duration;

use crate::Notification;

/// Timers a machine may arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Voter-side deadline for reaching the ready state after dialing.
    ConnectTimeout,
}

/// Actions for the runner to execute.
///
/// Sends are fire-and-forget: the runner must not block the event loop on
/// delivery, and a failed send comes back as `Event::ConnectionClosed` for
/// that connection only.
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a message on one connection.
    Send {
        /// Target connection.
        conn: ConnectionId,
        /// The message to encode and send.
        message: WireMessage,
    },

    /// Open an outbound connection to a peer. Voter only.
    Connect {
        /// The host's rendezvous identity.
        host: PeerIdentity,
    },

    /// Close a connection locally.
    Close {
        /// The connection to close.
        conn: ConnectionId,
    },

    /// Arm a timer. Re-arming an already-armed timer resets it.
    SetTimer {
        /// Which timer.
        timer: TimerKind,
        /// How long until it fires.
        duration: Duration,
    },

    /// Disarm a timer. Disarming an unarmed timer is a no-op.
    CancelTimer {
        /// Which timer.
        timer: TimerKind,
    },

    /// Write the durable host snapshot. Host only.
    PersistState {
        /// Snapshot to store under the fixed storage key.
        snapshot: PersistedState,
    },

    /// Surface a notification to the embedding caller (UI, test harness).
    Notify(Notification),
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Send { .. } => "Send",
            Action::Connect { .. } => "Connect",
            Action::Close { .. } => "Close",
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::PersistState { .. } => "PersistState",
            Action::Notify(_) => "Notify",
        }
    }
}
