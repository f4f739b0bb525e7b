//! Async driver for the host state machine.
//!
//! All I/O lives here: the machine stays synchronous and the runner feeds
//! it transport events and admin commands, then executes the returned
//! actions. Vote timestamps come from the wall clock, so the machine's
//! time is set to the Unix epoch offset before every step.

use crate::store::SnapshotStore;
use crate::transport::{Transport, TransportEvent};
use crate::TransportError;
use galavote_core::{Action, AdminCommand, Event, Notification, StateMachine};
use galavote_host::HostStateMachine;
use galavote_messages::{decode_message, encode_message};
use galavote_types::PeerIdentity;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 64;

/// Command side of a running host; clone to hand the admin surface around.
#[derive(Clone)]
pub struct HostHandle {
    commands: mpsc::Sender<AdminCommand>,
}

impl HostHandle {
    /// Queue an administrative command. Returns `false` once the runner
    /// has shut down.
    pub async fn admin(&self, command: AdminCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }
}

/// Owns the host machine, its transport, and its snapshot store.
pub struct HostRunner<T: Transport, S: SnapshotStore> {
    machine: HostStateMachine,
    transport: T,
    store: S,
    commands: mpsc::Receiver<AdminCommand>,
    notifications: mpsc::Sender<Notification>,
}

impl<T: Transport, S: SnapshotStore> HostRunner<T, S> {
    /// Create a runner, restoring any stored snapshot. A restored session
    /// always comes back with voting suspended.
    pub fn new(transport: T, store: S) -> (Self, HostHandle, mpsc::Receiver<Notification>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (notify_tx, notify_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let machine = HostStateMachine::from_persisted(store.load());
        let runner = Self {
            machine,
            transport,
            store,
            commands: command_rx,
            notifications: notify_tx,
        };
        (runner, HostHandle { commands: command_tx }, notify_rx)
    }

    /// Register with the rendezvous layer. The returned identity goes
    /// into the join link shared with voters.
    pub async fn acquire_identity(&mut self) -> Result<PeerIdentity, TransportError> {
        let identity = self.transport.acquire_identity().await?;
        info!(%identity, "host registered");
        Ok(identity)
    }

    /// Drive the host until the transport or the command channel closes.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.step(Event::Admin(command)).await,
                    None => break,
                },
                event = self.transport.next_event() => match event {
                    Some(event) => {
                        if let Some(event) = self.translate(event) {
                            self.step(event).await;
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("host runner stopped");
    }

    fn translate(&self, event: TransportEvent) -> Option<Event> {
        match event {
            TransportEvent::Incoming { conn } | TransportEvent::Opened { conn } => {
                Some(Event::ConnectionOpened { conn })
            }
            TransportEvent::Closed { conn } => Some(Event::ConnectionClosed { conn }),
            TransportEvent::Failed { conn, reason } => {
                Some(Event::ConnectionFailed { conn, reason })
            }
            TransportEvent::Message { conn, bytes } => match decode_message(&bytes) {
                Ok(message) => Some(Event::from_message(conn, message)),
                Err(error) => {
                    // A malformed peer never takes the host down.
                    warn!(%conn, %error, "dropping undecodable message");
                    None
                }
            },
        }
    }

    async fn step(&mut self, event: Event) {
        // Send failures feed back in as closes; drain until settled.
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            self.machine.set_time(wall_clock());
            for action in self.machine.handle(event) {
                self.apply(action, &mut pending).await;
            }
        }
    }

    async fn apply(&mut self, action: Action, pending: &mut VecDeque<Event>) {
        match action {
            Action::Send { conn, message } => {
                let bytes = match encode_message(&message) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        warn!(%error, "outbound message failed to encode");
                        return;
                    }
                };
                if let Err(error) = self.transport.send(conn, bytes).await {
                    // One dead voter must not break the broadcast; prune
                    // just that connection.
                    warn!(%conn, %error, "send failed, pruning connection");
                    self.transport.close(conn).await;
                    pending.push_back(Event::ConnectionClosed { conn });
                }
            }
            Action::Close { conn } => self.transport.close(conn).await,
            Action::PersistState { snapshot } => {
                if let Err(error) = self.store.store(&snapshot) {
                    warn!(%error, "snapshot write failed");
                }
            }
            Action::Notify(notification) => {
                // A full or dropped UI channel never blocks the protocol.
                let _ = self.notifications.try_send(notification);
            }
            other => {
                debug!(action = other.type_name(), "action not applicable to host runner");
            }
        }
    }
}

fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}
