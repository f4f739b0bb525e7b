//! Async driver for the voter state machine.
//!
//! Mirrors the host runner but additionally owns the connect-timeout
//! timer: the machine asks for one via `SetTimer` and the runner arms a
//! single `tokio::time::Sleep` for it.

use crate::transport::{Transport, TransportEvent};
use crate::TransportError;
use galavote_core::{Action, Event, Notification, StateMachine, TimerKind};
use galavote_messages::{decode_message, encode_message};
use galavote_types::{ConnectionId, PeerIdentity, ProgramId, VoterId};
use galavote_voter::{VoterConfig, VoterStateMachine};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;

/// Requests a voter UI can make of its runner.
#[derive(Debug, Clone)]
pub enum VoterCommand {
    /// Dial the host behind a join link's identity.
    Connect(PeerIdentity),
    /// Submit the single vote for a program.
    SubmitVote(ProgramId),
}

/// Command side of a running voter.
#[derive(Clone)]
pub struct VoterHandle {
    commands: mpsc::Sender<VoterCommand>,
}

impl VoterHandle {
    /// Dial a host. Returns `false` once the runner has shut down.
    pub async fn connect(&self, host: PeerIdentity) -> bool {
        self.commands.send(VoterCommand::Connect(host)).await.is_ok()
    }

    /// Submit a vote. Returns `false` once the runner has shut down.
    pub async fn submit_vote(&self, program_id: ProgramId) -> bool {
        self.commands
            .send(VoterCommand::SubmitVote(program_id))
            .await
            .is_ok()
    }
}

/// Owns the voter machine and its transport.
pub struct VoterRunner<T: Transport> {
    machine: VoterStateMachine,
    transport: T,
    commands: mpsc::Receiver<VoterCommand>,
    notifications: mpsc::Sender<Notification>,
    timer: Option<(TimerKind, Pin<Box<Sleep>>)>,
}

impl<T: Transport> VoterRunner<T> {
    /// Create a runner with a freshly generated instance-scoped voter id.
    pub fn new(transport: T, config: VoterConfig) -> (Self, VoterHandle, mpsc::Receiver<Notification>) {
        let voter_id = VoterId::generate(&mut rand::thread_rng());
        Self::with_voter_id(transport, config, voter_id)
    }

    /// Create a runner with an explicit voter id.
    pub fn with_voter_id(
        transport: T,
        config: VoterConfig,
        voter_id: VoterId,
    ) -> (Self, VoterHandle, mpsc::Receiver<Notification>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (notify_tx, notify_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let runner = Self {
            machine: VoterStateMachine::new(voter_id, config),
            transport,
            commands: command_rx,
            notifications: notify_tx,
            timer: None,
        };
        (runner, VoterHandle { commands: command_tx }, notify_rx)
    }

    /// Register with the rendezvous layer.
    pub async fn acquire_identity(&mut self) -> Result<PeerIdentity, TransportError> {
        self.transport.acquire_identity().await
    }

    /// Drive the voter until the transport or the command channel closes.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        let event = match command {
                            VoterCommand::Connect(host) => Event::ConnectRequested { host },
                            VoterCommand::SubmitVote(program_id) => Event::SubmitVote { program_id },
                        };
                        self.step(event).await;
                    }
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
                timer = fire(&mut self.timer) => {
                    self.timer = None;
                    self.step(Event::TimerFired { timer }).await;
                }
            }
        }
        debug!("voter runner stopped");
    }

    fn translate(&self, event: TransportEvent) -> Option<Event> {
        match event {
            TransportEvent::Opened { conn } | TransportEvent::Incoming { conn } => {
                Some(Event::ConnectionOpened { conn })
            }
            TransportEvent::Closed { conn } => Some(Event::ConnectionClosed { conn }),
            TransportEvent::Failed { conn, reason } => {
                Some(Event::ConnectionFailed { conn, reason })
            }
            TransportEvent::Message { conn, bytes } => match decode_message(&bytes) {
                Ok(message) => Some(Event::from_message(conn, message)),
                Err(error) => {
                    warn!(%conn, %error, "dropping undecodable message");
                    None
                }
            },
        }
    }

    async fn step(&mut self, event: Event) {
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
            Action::Connect { host } => {
                if let Err(error) = self.transport.connect(&host).await {
                    // The dial never produced a handle; the placeholder id
                    // is fine because the machine has none stored yet.
                    warn!(%host, %error, "dial failed to start");
                    pending.push_back(Event::ConnectionFailed {
                        conn: ConnectionId(u64::MAX),
                        reason: error.to_string(),
                    });
                }
            }
            Action::Send { conn, message } => {
                let bytes = match encode_message(&message) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        warn!(%error, "outbound message failed to encode");
                        return;
                    }
                };
                if let Err(error) = self.transport.send(conn, bytes).await {
                    warn!(%conn, %error, "send to host failed");
                    self.transport.close(conn).await;
                    pending.push_back(Event::ConnectionClosed { conn });
                }
            }
            Action::Close { conn } => self.transport.close(conn).await,
            Action::SetTimer { timer, duration } => {
                self.timer = Some((timer, Box::pin(tokio::time::sleep(duration))));
            }
            Action::CancelTimer { timer } => {
                if matches!(&self.timer, Some((armed, _)) if *armed == timer) {
                    self.timer = None;
                }
            }
            Action::Notify(notification) => {
                let _ = self.notifications.try_send(notification);
            }
            other => {
                debug!(action = other.type_name(), "action not applicable to voter runner");
            }
        }
    }
}

/// Resolves when the armed timer fires; pends forever when none is armed.
async fn fire(timer: &mut Option<(TimerKind, Pin<Box<Sleep>>)>) -> TimerKind {
    match timer {
        Some((kind, sleep)) => {
            sleep.as_mut().await;
            *kind
        }
        None => std::future::pending().await,
    }
}

fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
}
