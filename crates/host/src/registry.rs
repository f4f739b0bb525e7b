//! Registry of live voter connections.

use galavote_types::ConnectionId;
use indexmap::IndexMap;

/// Lifecycle state of one tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialing or handshaking; not yet usable for sends.
    Connecting,
    /// Usable for sends; included in broadcasts.
    Open,
    /// Closed by either side.
    Closed,
    /// Failed with a transport error.
    Errored,
}

/// One tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEntry {
    /// The transport's handle for this connection.
    pub id: ConnectionId,
    /// Current lifecycle state.
    pub state: ConnectionState,
}

/// Tracks at most one entry per remote party, keyed by connection id.
///
/// The registry emits no events of its own; the host machine mutates it in
/// reaction to transport notifications. Entries are pruned on close/error
/// (via [`unregister`](Self::unregister)) so the registry cannot grow
/// unboundedly over a long-running event.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: IndexMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection in the open state, returning its id.
    ///
    /// Re-registering a known id is a no-op beyond marking it open.
    pub fn register(&mut self, id: ConnectionId) -> ConnectionId {
        self.entries.insert(
            id,
            ConnectionEntry {
                id,
                state: ConnectionState::Open,
            },
        );
        id
    }

    /// Stop tracking a connection. Unknown ids are a no-op; returns whether
    /// an entry was actually removed.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    /// Look up a tracked connection.
    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.get(&id)
    }

    /// Visit every open connection, in registration order.
    pub fn for_each_open(&self, mut f: impl FnMut(&ConnectionEntry)) {
        for entry in self.entries.values() {
            if entry.state == ConnectionState::Open {
                f(entry);
            }
        }
    }

    /// Ids of every open connection, in registration order.
    pub fn open_ids(&self) -> Vec<ConnectionId> {
        let mut ids = Vec::with_capacity(self.entries.len());
        self.for_each_open(|entry| ids.push(entry.id));
        ids
    }

    /// Number of tracked connections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connections are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
