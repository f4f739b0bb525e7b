//! The deterministic simulation runner.

use crate::event_queue::{EventPriority, EventQueue};
use crate::{NetworkConfig, NodeIndex, SimStorage, SimulatedNetwork, HOST_NODE};
use galavote_core::{Action, AdminCommand, Event, Notification, StateMachine, TimerKind};
use galavote_host::HostStateMachine;
use galavote_messages::{decode_message, encode_message};
use galavote_types::{ConnectionId, HostState, PeerIdentity, ProgramId, VoterId, STORAGE_KEY};
use galavote_voter::{VoterConfig, VoterStateMachine};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

/// Safety cap on events per `run_until_idle` call; a protocol bug that
/// produces an event storm fails the test instead of hanging it.
const MAX_EVENTS_PER_RUN: u64 = 100_000;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of voter clients.
    pub num_voters: u32,
    /// Random seed for deterministic simulation.
    pub seed: u64,
    /// Network latency model.
    pub network: NetworkConfig,
    /// Config applied to every voter machine.
    pub voter: VoterConfig,
}

impl SimulationConfig {
    /// Create a configuration with the given number of voters.
    pub fn new(num_voters: u32) -> Self {
        Self {
            num_voters,
            seed: 12345,
            network: NetworkConfig::default(),
            voter: VoterConfig::default(),
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the network latency model.
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Set the per-voter configuration.
    pub fn with_voter(mut self, voter: VoterConfig) -> Self {
        self.voter = voter;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Counters collected over a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationStats {
    /// Events handed to state machines.
    pub events_processed: u64,
    /// Send actions executed.
    pub messages_sent: u64,
    /// Messages scheduled for delivery (sent minus dead-connection drops).
    pub messages_delivered: u64,
    /// Sends that hit a closed connection.
    pub messages_dropped: u64,
}

/// Drives one host and N voter machines over a simulated network.
///
/// Node 0 is the host; voter `i` lives at node `i + 1`. All scheduling is
/// deterministic in the seed.
pub struct SimulationRunner {
    host: HostStateMachine,
    host_identity: PeerIdentity,
    voters: Vec<VoterStateMachine>,
    queue: EventQueue,
    network: SimulatedNetwork,
    network_config: NetworkConfig,
    storage: SimStorage,
    rng: ChaCha8Rng,
    now: Duration,
    /// Expected fire time per armed timer; a popped fire that does not
    /// match was cancelled or re-armed and is dropped.
    armed_timers: HashMap<(NodeIndex, TimerKind), Duration>,
    notifications: Vec<(NodeIndex, Notification)>,
    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with a fresh, empty host.
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_host_state(config, HostState::new())
    }

    /// Create a runner around existing host state (e.g. restored from a
    /// stored snapshot).
    pub fn with_host_state(config: SimulationConfig, state: HostState) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut network = SimulatedNetwork::new();
        let host_identity = network.acquire_identity(HOST_NODE);
        let voters = (0..config.num_voters)
            .map(|_| VoterStateMachine::new(VoterId::generate(&mut rng), config.voter.clone()))
            .collect();
        Self {
            host: HostStateMachine::with_state(state),
            host_identity,
            voters,
            queue: EventQueue::new(),
            network,
            network_config: config.network,
            storage: SimStorage::new(),
            rng,
            now: Duration::ZERO,
            armed_timers: HashMap::new(),
            notifications: Vec::new(),
            stats: SimulationStats::default(),
        }
    }

    /// The host's rendezvous identity, as a join link would carry it.
    pub fn host_identity(&self) -> &PeerIdentity {
        &self.host_identity
    }

    /// The host's canonical state.
    pub fn host_state(&self) -> &HostState {
        self.host.state()
    }

    /// The host machine.
    pub fn host(&self) -> &HostStateMachine {
        &self.host
    }

    /// Voter machine `i`.
    pub fn voter(&self, i: u32) -> &VoterStateMachine {
        &self.voters[i as usize]
    }

    /// The simulated persistence layer.
    pub fn storage(&self) -> &SimStorage {
        &self.storage
    }

    /// Counters for the run so far.
    pub fn stats(&self) -> SimulationStats {
        self.stats
    }

    /// Notifications surfaced so far, with the node that emitted each.
    pub fn notifications(&self) -> &[(NodeIndex, Notification)] {
        &self.notifications
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    fn voter_node(i: u32) -> NodeIndex {
        i + 1
    }

    /// Queue an administrative command at the host.
    pub fn admin(&mut self, command: AdminCommand) {
        self.queue.push(
            self.now,
            EventPriority::Local,
            HOST_NODE,
            Event::Admin(command),
        );
    }

    /// Ask voter `i` to dial the host.
    pub fn connect_voter(&mut self, i: u32) {
        let host = self.host_identity.clone();
        self.connect_voter_to(i, host);
    }

    /// Ask voter `i` to dial an arbitrary identity (for failure paths).
    pub fn connect_voter_to(&mut self, i: u32, host: PeerIdentity) {
        self.queue.push(
            self.now,
            EventPriority::Local,
            Self::voter_node(i),
            Event::ConnectRequested { host },
        );
    }

    /// Ask voter `i` to submit a vote.
    pub fn submit_vote(&mut self, i: u32, program_id: ProgramId) {
        self.queue.push(
            self.now,
            EventPriority::Local,
            Self::voter_node(i),
            Event::SubmitVote { program_id },
        );
    }

    /// Abruptly sever voter `i`'s connection, notifying both ends.
    pub fn sever_voter(&mut self, i: u32) {
        let node = Self::voter_node(i);
        let Some(conn) = self.connection_of(node) else {
            return;
        };
        self.network.close(conn);
        for target in [node, HOST_NODE] {
            self.queue.push(
                self.now,
                EventPriority::Network,
                target,
                Event::ConnectionClosed { conn },
            );
        }
    }

    fn connection_of(&self, node: NodeIndex) -> Option<ConnectionId> {
        self.network.connection_of_dialer(node)
    }

    /// The open connection dialed by voter `i`, if any.
    pub fn voter_connection(&self, i: u32) -> Option<ConnectionId> {
        self.connection_of(Self::voter_node(i))
    }

    /// Queue a raw event at a node. Test hook for edge cases a well-behaved
    /// client never produces, like wire-level vote retries.
    pub fn inject(&mut self, node: NodeIndex, event: Event) {
        self.queue.push(self.now, EventPriority::Local, node, event);
    }

    /// Process queued events until nothing is pending.
    ///
    /// # Panics
    ///
    /// Panics if the run exceeds the event-storm safety cap.
    pub fn run_until_idle(&mut self) {
        let mut processed = 0u64;
        while let Some((key, event)) = self.queue.pop() {
            processed += 1;
            assert!(
                processed <= MAX_EVENTS_PER_RUN,
                "event storm: more than {MAX_EVENTS_PER_RUN} events in one run"
            );
            self.now = self.now.max(key.time);
            if !self.accept(key.node, key.time, &event) {
                continue;
            }
            self.dispatch(key.node, event);
        }
    }

    /// Timer fires must match the armed deadline; anything else was
    /// cancelled or superseded.
    fn accept(&mut self, node: NodeIndex, time: Duration, event: &Event) -> bool {
        if let Event::TimerFired { timer } = event {
            return match self.armed_timers.get(&(node, *timer)) {
                Some(deadline) if *deadline == time => {
                    self.armed_timers.remove(&(node, *timer));
                    true
                }
                _ => false,
            };
        }
        true
    }

    fn dispatch(&mut self, node: NodeIndex, event: Event) {
        self.stats.events_processed += 1;
        let now = self.now;
        let actions = if node == HOST_NODE {
            self.host.set_time(now);
            self.host.handle(event)
        } else {
            let voter = &mut self.voters[(node - 1) as usize];
            voter.set_time(now);
            voter.handle(event)
        };
        for action in actions {
            self.apply(node, action);
        }
    }

    fn apply(&mut self, node: NodeIndex, action: Action) {
        match action {
            Action::Send { conn, message } => {
                self.stats.messages_sent += 1;
                let peer = self
                    .network
                    .is_open(conn)
                    .then(|| self.network.peer_of(conn, node))
                    .flatten();
                let Some(peer) = peer else {
                    // Dead connection: the failure surfaces back to the
                    // sender as a close, never as a blocked broadcast.
                    self.stats.messages_dropped += 1;
                    self.queue.push(
                        self.now,
                        EventPriority::Network,
                        node,
                        Event::ConnectionClosed { conn },
                    );
                    return;
                };
                // Round-trip the real codec so wire bugs surface here.
                let delivered = encode_message(&message)
                    .and_then(|bytes| decode_message(&bytes))
                    .map(|decoded| Event::from_message(conn, decoded));
                match delivered {
                    Ok(event) => {
                        self.stats.messages_delivered += 1;
                        let latency = self.network_config.sample_latency(&mut self.rng);
                        self.queue
                            .push(self.now + latency, EventPriority::Network, peer, event);
                    }
                    Err(error) => {
                        warn!(%error, "simulated send failed to round-trip the codec");
                        self.stats.messages_dropped += 1;
                    }
                }
            }
            Action::Connect { host } => match self.network.open(node, &host) {
                Some(conn) => {
                    let latency = self.network_config.sample_latency(&mut self.rng);
                    for target in [node, HOST_NODE] {
                        self.queue.push(
                            self.now + latency,
                            EventPriority::Network,
                            target,
                            Event::ConnectionOpened { conn },
                        );
                    }
                }
                None => {
                    let conn = self.network.failed_dial();
                    let latency = self.network_config.sample_latency(&mut self.rng);
                    self.queue.push(
                        self.now + latency,
                        EventPriority::Network,
                        node,
                        Event::ConnectionFailed {
                            conn,
                            reason: format!("unknown peer identity {host}"),
                        },
                    );
                }
            },
            Action::Close { conn } => {
                if let Some(peer) = self.network.peer_of(conn, node) {
                    let latency = self.network_config.sample_latency(&mut self.rng);
                    self.queue.push(
                        self.now + latency,
                        EventPriority::Network,
                        peer,
                        Event::ConnectionClosed { conn },
                    );
                }
                self.network.close(conn);
            }
            Action::SetTimer { timer, duration } => {
                let deadline = self.now + duration;
                self.armed_timers.insert((node, timer), deadline);
                self.queue.push(
                    deadline,
                    EventPriority::Timer,
                    node,
                    Event::TimerFired { timer },
                );
            }
            Action::CancelTimer { timer } => {
                self.armed_timers.remove(&(node, timer));
            }
            Action::PersistState { snapshot } => {
                self.storage.store(STORAGE_KEY, snapshot);
            }
            Action::Notify(notification) => {
                self.notifications.push((node, notification));
            }
        }
    }
}
