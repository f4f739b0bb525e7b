//! Deterministic simulation runner.
//!
//! This crate provides a fully deterministic simulation environment for
//! testing the sync protocol. Given the same seed, it produces identical
//! results every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event Queue (BTreeMap<EventKey, …>)            │ │
//! │  │     Ordered by: time, priority, node, sequence     │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     node 0: HostStateMachine                       │ │
//! │  │     nodes 1..: VoterStateMachine                   │ │
//! │  │     Each processes events sequentially             │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Actions → sends, timers, persistence           │ │
//! │  │     scheduled back as new events                   │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Sends go through the real JSON codec so wire-shape bugs surface in
//! simulation, not just in production.

mod event_queue;
mod network;
mod runner;
mod storage;
mod workload;

pub use event_queue::{EventKey, EventPriority};
pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{SimulationConfig, SimulationRunner, SimulationStats};
pub use storage::SimStorage;
pub use workload::{demo_program_drafts, VoteWorkload};

/// Type alias for deterministic node indexing in simulation.
///
/// This is a simulation-only concept for routing between in-process
/// machines. Node 0 is always the host; voters start at 1. Production code
/// routes by `ConnectionId` and `PeerIdentity`.
pub type NodeIndex = u32;

/// The host's node index.
pub const HOST_NODE: NodeIndex = 0;
