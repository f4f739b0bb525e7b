//! Deterministic event ordering.

use crate::NodeIndex;
use galavote_core::Event;
use std::collections::BTreeMap;
use std::time::Duration;

/// Tie-break class for events scheduled at the same instant.
///
/// Local intents run before network deliveries, which run before timers,
/// matching how a real event loop drains its queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// Admin commands and caller intents.
    Local = 0,
    /// Message and connection-lifecycle deliveries.
    Network = 1,
    /// Timer expirations.
    Timer = 2,
}

/// Total order over scheduled events.
///
/// The sequence number makes the order a strict total order even for
/// identical (time, priority, node) triples, which is what makes runs
/// reproducible under one seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    /// Simulated delivery time.
    pub time: Duration,
    /// Tie-break class.
    pub priority: EventPriority,
    /// Target node.
    pub node: NodeIndex,
    /// Global insertion counter.
    pub seq: u64,
}

/// The pending-event queue.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: BTreeMap<EventKey, Event>,
    next_seq: u64,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event for a node.
    pub fn push(&mut self, time: Duration, priority: EventPriority, node: NodeIndex, event: Event) {
        let key = EventKey {
            time,
            priority,
            node,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.events.insert(key, event);
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<(EventKey, Event)> {
        self.events.pop_first()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
