//! The host sync state machine.

use galavote_core::{
    Action, AdminCommand, Event, Notification, StateMachine, VoteRejectReason,
};
use galavote_messages::WireMessage;
use galavote_types::{ConnectionId, HostState, PersistedState, ProgramId, VoterId};
use std::time::Duration;
use tracing::{debug, warn};

use crate::ConnectionRegistry;

/// The host's sync controller.
///
/// Owns the canonical [`HostState`] and the connection registry. Every
/// state-affecting change produces a persist action followed by one `Send`
/// of the fresh snapshot per open connection; a newly opened connection
/// gets a snapshot immediately so late joiners never wait for an unrelated
/// change.
#[derive(Debug)]
pub struct HostStateMachine {
    state: HostState,
    registry: ConnectionRegistry,
    now: Duration,
}

impl HostStateMachine {
    /// Create a host with empty state.
    pub fn new() -> Self {
        Self::with_state(HostState::new())
    }

    /// Create a host around existing state.
    pub fn with_state(state: HostState) -> Self {
        Self {
            state,
            registry: ConnectionRegistry::new(),
            now: Duration::ZERO,
        }
    }

    /// Create a host from an optional persisted snapshot.
    ///
    /// `None` (no stored data, or unreadable stored data that the store
    /// layer already logged) starts empty.
    pub fn from_persisted(persisted: Option<PersistedState>) -> Self {
        match persisted {
            Some(p) => Self::with_state(HostState::from_persisted(p)),
            None => Self::new(),
        }
    }

    /// The canonical state.
    pub fn state(&self) -> &HostState {
        &self.state
    }

    /// The connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// One `Send` of the current snapshot per open connection.
    fn broadcast(&self) -> Vec<Action> {
        let message = WireMessage::sync_state(&self.state);
        self.registry
            .open_ids()
            .into_iter()
            .map(|conn| Action::Send {
                conn,
                message: message.clone(),
            })
            .collect()
    }

    /// Persist-then-broadcast tail shared by every mutating operation.
    fn after_mutation(&self) -> Vec<Action> {
        let mut actions = vec![Action::PersistState {
            snapshot: self.state.to_persisted(),
        }];
        actions.extend(self.broadcast());
        actions
    }

    fn on_connection_opened(&mut self, conn: ConnectionId) -> Vec<Action> {
        self.registry.register(conn);
        debug!(%conn, voters = self.registry.len(), "voter connected");
        vec![
            Action::Notify(Notification::VoterConnected { conn }),
            // Snapshot to this connection alone; the rest are current.
            Action::Send {
                conn,
                message: WireMessage::sync_state(&self.state),
            },
        ]
    }

    fn on_connection_gone(&mut self, conn: ConnectionId) -> Vec<Action> {
        if self.registry.unregister(conn) {
            debug!(%conn, voters = self.registry.len(), "voter disconnected");
            vec![Action::Notify(Notification::VoterDisconnected { conn })]
        } else {
            Vec::new()
        }
    }

    fn on_vote(
        &mut self,
        conn: ConnectionId,
        program_id: ProgramId,
        voter_id: VoterId,
    ) -> Vec<Action> {
        let timestamp = self.now.as_millis() as u64;
        use galavote_types::VoteOutcome::*;
        match self.state.record_vote(program_id.clone(), voter_id.clone(), timestamp) {
            Recorded => {
                debug!(%conn, %program_id, %voter_id, "vote recorded");
                let mut actions = vec![Action::Notify(Notification::VoteAccepted {
                    program_id,
                    voter_id,
                })];
                actions.extend(self.after_mutation());
                actions
            }
            Duplicate => {
                // First write won; a client retry or double-tap, not an error.
                debug!(%conn, %voter_id, "duplicate vote dropped");
                Vec::new()
            }
            UnknownProgram(id) => {
                warn!(%conn, program_id = %id, "vote for unknown program dropped");
                vec![Action::Notify(Notification::VoteRejected {
                    conn,
                    reason: VoteRejectReason::UnknownProgram(id),
                })]
            }
            VotingClosed => {
                warn!(%conn, %program_id, "vote while voting closed dropped");
                vec![Action::Notify(Notification::VoteRejected {
                    conn,
                    reason: VoteRejectReason::VotingClosed,
                })]
            }
        }
    }

    fn on_admin(&mut self, command: AdminCommand) -> Vec<Action> {
        match command {
            AdminCommand::ToggleVoting => {
                let active = self.state.toggle_voting();
                debug!(active, "voting toggled");
                self.after_mutation()
            }
            AdminCommand::AddProgram(draft) => {
                let program = self.state.add_program(draft);
                debug!(id = %program.id, name = %program.name, "program added");
                self.after_mutation()
            }
            AdminCommand::DeleteProgram(id) => {
                if self.state.delete_program(&id) {
                    debug!(%id, "program deleted, votes orphaned");
                    self.after_mutation()
                } else {
                    warn!(%id, "delete of unknown program ignored");
                    Vec::new()
                }
            }
            AdminCommand::ResetVotes => {
                self.state.reset_votes();
                debug!("votes reset");
                self.after_mutation()
            }
        }
    }
}

impl Default for HostStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine for HostStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::ConnectionOpened { conn } => self.on_connection_opened(conn),
            Event::ConnectionClosed { conn } => self.on_connection_gone(conn),
            Event::ConnectionFailed { conn, reason } => {
                warn!(%conn, %reason, "voter connection failed");
                self.on_connection_gone(conn)
            }
            Event::VoteReceived {
                conn,
                program_id,
                voter_id,
            } => self.on_vote(conn, program_id, voter_id),
            Event::Admin(command) => self.on_admin(command),
            other => {
                // Voter-role events; a peer sending SYNC_STATE at the host
                // lands here too. Dropped, never fatal.
                warn!(event = other.type_name(), "event not handled by host");
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

#[cfg(test)]
mod tests {
    use super::*;
    use galavote_messages::StateSnapshot;
    use galavote_types::ProgramDraft;

    fn draft(n: u32) -> ProgramDraft {
        ProgramDraft::new(format!("Program {n}"), "Troupe", "", format!("img-{n}"))
    }

    fn active_host(programs: u32) -> HostStateMachine {
        let mut host = HostStateMachine::new();
        for i in 0..programs {
            host.handle(Event::Admin(AdminCommand::AddProgram(draft(i))));
        }
        host.handle(Event::Admin(AdminCommand::ToggleVoting));
        host
    }

    fn first_program(host: &HostStateMachine) -> ProgramId {
        host.state().programs().next().unwrap().id.clone()
    }

    fn sends(actions: &[Action]) -> Vec<(ConnectionId, &WireMessage)> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send { conn, message } => Some((*conn, message)),
                _ => None,
            })
            .collect()
    }

    fn snapshot_of(message: &WireMessage) -> &StateSnapshot {
        match message {
            WireMessage::SyncState(snapshot) => snapshot,
            other => panic!("Expected SyncState, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_late_join_gets_immediate_snapshot() {
        let mut host = active_host(10);
        let actions = host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });

        let sends = sends(&actions);
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, ConnectionId(1));
        let snapshot = snapshot_of(sends[0].1);
        assert_eq!(snapshot.programs.len(), 10);
        assert!(snapshot.is_active);
    }

    #[test]
    fn test_vote_broadcasts_to_every_open_connection() {
        let mut host = active_host(2);
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(2),
        });

        let program = first_program(&host);
        let actions = host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: program.clone(),
            voter_id: VoterId::new("a1"),
        });

        // Sender included: the host is the single source of truth.
        let sends = sends(&actions);
        assert_eq!(
            sends.iter().map(|(c, _)| *c).collect::<Vec<_>>(),
            vec![ConnectionId(1), ConnectionId(2)]
        );
        for (_, message) in &sends {
            assert_eq!(snapshot_of(message).vote_counts[&program], 1);
        }
        // And the change is persisted.
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::PersistState { snapshot } if snapshot.votes.len() == 1)));
    }

    #[test]
    fn test_duplicate_vote_is_silent_noop() {
        let mut host = active_host(2);
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });
        let program = first_program(&host);

        host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: program.clone(),
            voter_id: VoterId::new("a1"),
        });
        // Simulated network retry of the exact same message.
        let actions = host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: program.clone(),
            voter_id: VoterId::new("a1"),
        });

        assert!(actions.is_empty());
        assert_eq!(host.state().tally()[&program], 1);
    }

    #[test]
    fn test_rejected_votes_notify_but_do_not_broadcast() {
        let mut host = active_host(1);
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });

        let actions = host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: ProgramId::new("404"),
            voter_id: VoterId::new("x"),
        });
        assert!(sends(&actions).is_empty());
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Notify(Notification::VoteRejected {
                reason: VoteRejectReason::UnknownProgram(_),
                ..
            })
        )));

        // Gate: suspend, then vote.
        host.handle(Event::Admin(AdminCommand::ToggleVoting));
        let program = first_program(&host);
        let actions = host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: program.clone(),
            voter_id: VoterId::new("x"),
        });
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Notify(Notification::VoteRejected {
                reason: VoteRejectReason::VotingClosed,
                ..
            })
        )));
        assert!(host.state().votes().is_empty());
    }

    #[test]
    fn test_send_failure_prunes_only_that_connection() {
        let mut host = active_host(1);
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(2),
        });

        // The runner reports a failed send as ConnectionClosed.
        host.handle(Event::ConnectionClosed {
            conn: ConnectionId(1),
        });
        assert_eq!(host.registry().open_ids(), vec![ConnectionId(2)]);

        // Subsequent broadcasts reach the survivor only.
        let actions = host.handle(Event::Admin(AdminCommand::ToggleVoting));
        let sends = sends(&actions);
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, ConnectionId(2));
    }

    #[test]
    fn test_close_of_unknown_connection_is_noop() {
        let mut host = active_host(1);
        let actions = host.handle(Event::ConnectionClosed {
            conn: ConnectionId(77),
        });
        assert!(actions.is_empty());
    }

    #[test]
    fn test_delete_program_keeps_votes_and_broadcasts() {
        let mut host = active_host(2);
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });
        let p2 = host.state().programs().nth(1).unwrap().id.clone();
        host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: p2.clone(),
            voter_id: VoterId::new("b1"),
        });

        let actions = host.handle(Event::Admin(AdminCommand::DeleteProgram(p2.clone())));
        let sends = sends(&actions);
        assert_eq!(sends.len(), 1);
        let snapshot = snapshot_of(sends[0].1);
        assert!(!snapshot.vote_counts.contains_key(&p2));
        // The raw record is still persisted.
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::PersistState { snapshot } if snapshot.votes.len() == 1)));
    }

    #[test]
    fn test_reset_votes_twice_is_idempotent() {
        let mut host = active_host(1);
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });
        let program = first_program(&host);
        host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: program,
            voter_id: VoterId::new("a1"),
        });

        let first = host.handle(Event::Admin(AdminCommand::ResetVotes));
        assert!(host.state().votes().is_empty());
        assert!(!sends(&first).is_empty());

        let second = host.handle(Event::Admin(AdminCommand::ResetVotes));
        assert!(host.state().votes().is_empty());
        // Still a full persist + broadcast cycle, still no error.
        assert!(!sends(&second).is_empty());
    }

    #[test]
    fn test_vote_timestamp_comes_from_machine_clock() {
        let mut host = active_host(1);
        host.handle(Event::ConnectionOpened {
            conn: ConnectionId(1),
        });
        host.set_time(Duration::from_millis(5_000));

        let program = first_program(&host);
        host.handle(Event::VoteReceived {
            conn: ConnectionId(1),
            program_id: program,
            voter_id: VoterId::new("a1"),
        });
        assert_eq!(host.state().votes()[0].timestamp, 5_000);
    }

    #[test]
    fn test_voter_role_events_are_dropped() {
        let mut host = active_host(1);
        let actions = host.handle(Event::SyncStateReceived {
            conn: ConnectionId(1),
            snapshot: StateSnapshot::empty(),
        });
        assert!(actions.is_empty());
        // Canonical state untouched.
        assert_eq!(host.state().program_count(), 1);
    }
}
