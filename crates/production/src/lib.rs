//! Async runners for real deployments.
//!
//! The state machines in `galavote-host` and `galavote-voter` are pure and
//! synchronous; this crate supplies everything around them that touches
//! the outside world:
//!
//! - [`Transport`]: the rendezvous network abstraction, with an
//!   in-process [`ChannelTransport`] implementation,
//! - [`HostRunner`] / [`VoterRunner`]: tokio event loops feeding the
//!   machines and executing their actions,
//! - [`SnapshotStore`] / [`FileStore`]: durable host snapshots,
//! - join-link building and parsing.

pub mod host_runner;
pub mod link;
pub mod store;
pub mod transport;
pub mod voter_runner;

pub use host_runner::{HostHandle, HostRunner};
pub use link::{join_link, parse_view, ViewMode};
pub use store::{FileStore, MemoryStore, SnapshotStore, StoreError};
pub use transport::{ChannelHub, ChannelTransport, Transport, TransportError, TransportEvent};
pub use voter_runner::{VoterCommand, VoterHandle, VoterRunner};
