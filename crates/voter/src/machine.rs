//! The voter client state machine.

use galavote_core::{Action, Event, Notification, StateMachine, SubmitError, TimerKind};
use galavote_messages::{StateSnapshot, WireMessage};
use galavote_types::{ConnectionId, ProgramId, VoterId};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::VoterConfig;

/// Connection phase of the voter.
///
/// `HasVoted` is deliberately not a phase: it is a sticky flag that
/// survives disconnects, so a client that voted and then dropped still
/// reports itself as having voted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterPhase {
    /// No connection; a connect request is the only way forward.
    Disconnected,
    /// Dialed the host, waiting for the connection to open.
    Connecting,
    /// Connection open, waiting for the host's initial snapshot.
    AwaitingSnapshot,
    /// Snapshot applied; ready to vote.
    Ready,
}

/// The voter's sync controller.
///
/// Holds the read-only copy of the host's state as last pushed and the
/// client's single instance-scoped [`VoterId`].
#[derive(Debug)]
pub struct VoterStateMachine {
    config: VoterConfig,
    /// Generated once per machine instance, never per vote.
    voter_id: VoterId,
    phase: VoterPhase,
    /// The one outbound connection, once the transport reports it open.
    conn: Option<ConnectionId>,
    /// Last snapshot pushed by the host.
    snapshot: StateSnapshot,
    has_voted: bool,
    voted_program: Option<ProgramId>,
    now: Duration,
}

impl VoterStateMachine {
    /// Create a voter client with the given instance id.
    pub fn new(voter_id: VoterId, config: VoterConfig) -> Self {
        Self {
            config,
            voter_id,
            phase: VoterPhase::Disconnected,
            conn: None,
            snapshot: StateSnapshot::empty(),
            has_voted: false,
            voted_program: None,
            now: Duration::ZERO,
        }
    }

    /// Current connection phase.
    pub fn phase(&self) -> VoterPhase {
        self.phase
    }

    /// This client's instance-scoped voter id.
    pub fn voter_id(&self) -> &VoterId {
        &self.voter_id
    }

    /// Whether the single vote has been sent.
    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    /// The program voted for, if any.
    pub fn voted_program(&self) -> Option<&ProgramId> {
        self.voted_program.as_ref()
    }

    /// The host state as last pushed.
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    /// Whether an event's connection refers to the live connection.
    fn is_current(&self, conn: ConnectionId) -> bool {
        self.conn == Some(conn)
    }

    fn on_connect_requested(&mut self, host: galavote_types::PeerIdentity) -> Vec<Action> {
        if self.phase != VoterPhase::Disconnected {
            warn!(phase = ?self.phase, "connect requested while not disconnected, ignored");
            return Vec::new();
        }
        debug!(%host, "dialing host");
        self.phase = VoterPhase::Connecting;
        vec![
            Action::Connect { host },
            Action::SetTimer {
                timer: TimerKind::ConnectTimeout,
                duration: self.config.connect_timeout,
            },
        ]
    }

    fn on_connection_opened(&mut self, conn: ConnectionId) -> Vec<Action> {
        if self.phase != VoterPhase::Connecting {
            trace!(%conn, phase = ?self.phase, "unexpected connection open, ignored");
            return Vec::new();
        }
        debug!(%conn, "connected, awaiting initial snapshot");
        self.conn = Some(conn);
        self.phase = VoterPhase::AwaitingSnapshot;
        // Timer stays armed: ready means snapshot applied, not just open.
        Vec::new()
    }

    fn on_sync_state(&mut self, conn: ConnectionId, snapshot: StateSnapshot) -> Vec<Action> {
        if !self.is_current(conn) {
            trace!(%conn, "snapshot on stale connection, ignored");
            return Vec::new();
        }
        // Last write wins, unconditionally: the host is the sole authority.
        self.snapshot = snapshot;
        match self.phase {
            VoterPhase::AwaitingSnapshot => {
                debug!(programs = self.snapshot.programs.len(), "initial snapshot applied");
                self.phase = VoterPhase::Ready;
                vec![
                    Action::CancelTimer {
                        timer: TimerKind::ConnectTimeout,
                    },
                    Action::Notify(Notification::SnapshotApplied {
                        snapshot: self.snapshot.clone(),
                        first: true,
                    }),
                ]
            }
            VoterPhase::Ready => vec![Action::Notify(Notification::SnapshotApplied {
                snapshot: self.snapshot.clone(),
                first: false,
            })],
            _ => {
                trace!("snapshot outside a connected phase, ignored");
                Vec::new()
            }
        }
    }

    fn on_submit_vote(&mut self, program_id: ProgramId) -> Vec<Action> {
        let refusal = match self.phase {
            VoterPhase::Ready if self.has_voted => Some(SubmitError::AlreadyVoted),
            VoterPhase::Ready => None,
            VoterPhase::AwaitingSnapshot => Some(SubmitError::AwaitingSnapshot),
            _ => Some(SubmitError::NotConnected),
        };
        if let Some(reason) = refusal {
            debug!(%program_id, %reason, "vote submit refused");
            return vec![Action::Notify(Notification::SubmitFailed { reason })];
        }

        let conn = match self.conn {
            Some(conn) => conn,
            None => {
                // Phase Ready implies a live connection; treat a missing
                // handle as not connected rather than panic.
                warn!("ready phase without a connection handle");
                return vec![Action::Notify(Notification::SubmitFailed {
                    reason: SubmitError::NotConnected,
                })];
            }
        };

        // Optimistic: HasVoted on local send acceptance. The protocol has
        // no host acknowledgment for votes.
        self.has_voted = true;
        self.voted_program = Some(program_id.clone());
        debug!(%program_id, voter_id = %self.voter_id, "vote submitted");
        vec![
            Action::Send {
                conn,
                message: WireMessage::vote(program_id.clone(), self.voter_id.clone()),
            },
            Action::Notify(Notification::VoteSubmitted { program_id }),
        ]
    }

    fn on_timer(&mut self, timer: TimerKind) -> Vec<Action> {
        match (timer, self.phase) {
            (TimerKind::ConnectTimeout, VoterPhase::Connecting)
            | (TimerKind::ConnectTimeout, VoterPhase::AwaitingSnapshot) => {
                warn!(timeout = ?self.config.connect_timeout, "connect timed out");
                let conn = self.conn.take();
                self.phase = VoterPhase::Disconnected;
                let mut actions = Vec::new();
                if let Some(conn) = conn {
                    actions.push(Action::Close { conn });
                }
                actions.push(Action::Notify(Notification::ConnectFailed {
                    reason: "timed out waiting for host".to_owned(),
                }));
                actions
            }
            _ => {
                // Stale timer that raced the snapshot; nothing to do.
                trace!(?timer, phase = ?self.phase, "stale timer ignored");
                Vec::new()
            }
        }
    }

    fn on_connection_gone(&mut self, conn: ConnectionId, reason: Option<String>) -> Vec<Action> {
        // While still connecting there is no handle yet; any failure
        // belongs to our one in-flight dial.
        let ours = self.is_current(conn) || (self.conn.is_none() && self.phase == VoterPhase::Connecting);
        if !ours || self.phase == VoterPhase::Disconnected {
            trace!(%conn, "close on stale connection, ignored");
            return Vec::new();
        }

        let was_ready = self.phase == VoterPhase::Ready;
        self.conn = None;
        self.phase = VoterPhase::Disconnected;

        let notification = if was_ready {
            debug!(had_voted = self.has_voted, "connection to host lost");
            Notification::Disconnected {
                had_voted: self.has_voted,
            }
        } else {
            let reason = reason.unwrap_or_else(|| "connection closed before sync".to_owned());
            warn!(%reason, "could not reach ready state");
            Notification::ConnectFailed { reason }
        };
        vec![
            Action::CancelTimer {
                timer: TimerKind::ConnectTimeout,
            },
            Action::Notify(notification),
        ]
    }
}

impl StateMachine for VoterStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::ConnectRequested { host } => self.on_connect_requested(host),
            Event::ConnectionOpened { conn } => self.on_connection_opened(conn),
            Event::ConnectionClosed { conn } => self.on_connection_gone(conn, None),
            Event::ConnectionFailed { conn, reason } => self.on_connection_gone(conn, Some(reason)),
            Event::SyncStateReceived { conn, snapshot } => self.on_sync_state(conn, snapshot),
            Event::SubmitVote { program_id } => self.on_submit_vote(program_id),
            Event::TimerFired { timer } => self.on_timer(timer),
            other => {
                // Host-role events; a peer sending VOTE at a voter lands
                // here. Dropped, never fatal.
                warn!(event = other.type_name(), "event not handled by voter");
                Vec::new()
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
