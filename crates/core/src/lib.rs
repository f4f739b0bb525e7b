//! Core abstractions for the sync protocol state machines.
//!
//! Both the host and the voter are synchronous, deterministic state
//! machines: they consume [`Event`]s one at a time and return [`Action`]s
//! for a runner to execute. All I/O (network sends, timers, persistence)
//! happens in the runner, never in the machines, so the whole protocol can
//! be driven deterministically in tests.

mod action;
mod event;
mod notification;
mod traits;

pub use action::{Action, TimerKind};
pub use event::{AdminCommand, Event};
pub use notification::{Notification, SubmitError, VoteRejectReason};
pub use traits::StateMachine;
