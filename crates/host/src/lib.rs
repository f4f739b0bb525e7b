//! Host-side sync controller.
//!
//! The host owns the canonical voting state. It registers voter
//! connections, ingests and dedups votes, and pushes a full `SYNC_STATE`
//! snapshot to every open connection after any state-affecting change:
//! the host is the single source of truth and all voters converge on it.

mod machine;
mod registry;

pub use machine::HostStateMachine;
pub use registry::{ConnectionEntry, ConnectionRegistry, ConnectionState};
