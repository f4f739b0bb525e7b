//! Voter client controller.
//!
//! A voter keeps exactly one outbound connection to the host, applies every
//! pushed snapshot unconditionally (the host is the sole authority), and
//! submits at most one vote per process lifetime. Connection loss is
//! surfaced to the caller and never retried silently; recovery is a fresh
//! connect request.

mod config;
mod machine;

pub use config::VoterConfig;
pub use machine::{VoterPhase, VoterStateMachine};
