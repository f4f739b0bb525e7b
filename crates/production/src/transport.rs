//! Transport abstraction over a rendezvous-style peer network.
//!
//! Connections are dialed by [`PeerIdentity`], the opaque string a host
//! publishes in its join link. The trait hides whatever broker or relay
//! hands those identities out; runners only see connection handles and a
//! stream of [`TransportEvent`]s.
//!
//! Dialing is split in two: [`Transport::connect`] starts the dial and
//! returns the local handle immediately, and the outcome arrives later as
//! an [`TransportEvent::Opened`] or [`TransportEvent::Failed`]. That keeps
//! the runner loop free of nested awaits and matches how the state
//! machines model connection lifecycle.

use async_trait::async_trait;
use galavote_types::{ConnectionId, PeerIdentity};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors surfaced by transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has no identity yet; call `acquire_identity` first.
    #[error("transport identity not acquired")]
    NoIdentity,

    /// The connection is gone; sends on it cannot succeed.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// The underlying broker or relay refused us.
    #[error("transport rejected: {0}")]
    Rejected(String),
}

/// Asynchronous connection lifecycle and message events.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A peer dialed our identity and the connection is ready.
    Incoming { conn: ConnectionId },
    /// A dial we started completed; the connection is ready.
    Opened { conn: ConnectionId },
    /// A peer sent us bytes on an open connection.
    Message { conn: ConnectionId, bytes: Vec<u8> },
    /// The connection closed, cleanly or not.
    Closed { conn: ConnectionId },
    /// A dial we started could not complete.
    Failed { conn: ConnectionId, reason: String },
}

/// A peer endpoint on the rendezvous network.
///
/// One transport instance backs one node. Implementations must deliver
/// events in the order the network produced them and must never block
/// `send` on a slow peer; buffer or fail instead.
#[async_trait]
pub trait Transport: Send {
    /// Register with the rendezvous layer and return our dialable identity.
    async fn acquire_identity(&mut self) -> Result<PeerIdentity, TransportError>;

    /// Start dialing `peer`. Returns the local connection handle; the
    /// outcome arrives as an `Opened` or `Failed` event.
    async fn connect(&mut self, peer: &PeerIdentity) -> Result<ConnectionId, TransportError>;

    /// Send bytes on an open connection.
    async fn send(&mut self, conn: ConnectionId, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Close a connection. Idempotent.
    async fn close(&mut self, conn: ConnectionId);

    /// Next event from the network, or `None` once the transport shuts
    /// down for good.
    async fn next_event(&mut self) -> Option<TransportEvent>;
}

struct HubPeer {
    events: mpsc::UnboundedSender<TransportEvent>,
}

#[derive(Default)]
struct HubState {
    peers: HashMap<PeerIdentity, HubPeer>,
    links: HashMap<ConnectionId, (PeerIdentity, PeerIdentity)>,
    next_peer: u64,
    next_conn: u64,
}

impl HubState {
    fn alloc_conn(&mut self) -> ConnectionId {
        let conn = ConnectionId(self.next_conn);
        self.next_conn += 1;
        conn
    }

    fn push(&self, identity: &PeerIdentity, event: TransportEvent) {
        if let Some(peer) = self.peers.get(identity) {
            // A dropped receiver means the peer's runner is gone; the
            // link teardown below handles that on the next send.
            let _ = peer.events.send(event);
        }
    }
}

/// In-process rendezvous hub backing [`ChannelTransport`].
///
/// Every transport created from the same hub can dial every other by
/// identity. Used by runner tests and local demos; a real deployment
/// substitutes a broker-backed implementation of [`Transport`].
#[derive(Clone, Default)]
pub struct ChannelHub {
    state: Arc<Mutex<HubState>>,
}

impl ChannelHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport endpoint attached to this hub.
    pub fn transport(&self) -> ChannelTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        ChannelTransport {
            state: Arc::clone(&self.state),
            identity: None,
            events_tx: tx,
            events_rx: rx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of live links, for test assertions.
    pub fn open_connections(&self) -> usize {
        self.lock().links.len()
    }
}

/// Channel-backed [`Transport`] for in-process wiring.
pub struct ChannelTransport {
    state: Arc<Mutex<HubState>>,
    identity: Option<PeerIdentity>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl ChannelTransport {
    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn identity(&self) -> Result<PeerIdentity, TransportError> {
        self.identity.clone().ok_or(TransportError::NoIdentity)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn acquire_identity(&mut self) -> Result<PeerIdentity, TransportError> {
        if let Some(identity) = &self.identity {
            return Ok(identity.clone());
        }
        let mut state = self.lock();
        let identity = PeerIdentity::new(format!("peer-{}", state.next_peer));
        state.next_peer += 1;
        state.peers.insert(
            identity.clone(),
            HubPeer {
                events: self.events_tx.clone(),
            },
        );
        drop(state);
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    async fn connect(&mut self, peer: &PeerIdentity) -> Result<ConnectionId, TransportError> {
        let me = self.identity()?;
        let mut state = self.lock();
        let conn = state.alloc_conn();
        if state.peers.contains_key(peer) {
            state.links.insert(conn, (me.clone(), peer.clone()));
            state.push(peer, TransportEvent::Incoming { conn });
            state.push(&me, TransportEvent::Opened { conn });
        } else {
            state.push(
                &me,
                TransportEvent::Failed {
                    conn,
                    reason: format!("unknown peer identity {peer}"),
                },
            );
        }
        Ok(conn)
    }

    async fn send(&mut self, conn: ConnectionId, bytes: Vec<u8>) -> Result<(), TransportError> {
        let me = self.identity()?;
        let state = self.lock();
        let Some((a, b)) = state.links.get(&conn) else {
            return Err(TransportError::ConnectionClosed(conn));
        };
        let other = if *a == me { b } else { a };
        state.push(other, TransportEvent::Message { conn, bytes });
        Ok(())
    }

    async fn close(&mut self, conn: ConnectionId) {
        let Ok(me) = self.identity() else {
            return;
        };
        let mut state = self.lock();
        if let Some((a, b)) = state.links.remove(&conn) {
            let other = if a == me { b } else { a };
            state.push(&other, TransportEvent::Closed { conn });
        }
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }
}
