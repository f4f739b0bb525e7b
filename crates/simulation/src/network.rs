//! Simulated point-to-point network.

use crate::NodeIndex;
use galavote_types::{ConnectionId, PeerIdentity};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

/// Network behavior knobs.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Fixed one-way delivery delay.
    pub base_latency: Duration,
    /// Additional uniformly-random delay in `0..=jitter`.
    pub jitter: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_latency: Duration::from_millis(20),
            jitter: Duration::from_millis(10),
        }
    }
}

impl NetworkConfig {
    /// A zero-latency network; useful for step-by-step tests.
    pub fn instant() -> Self {
        Self {
            base_latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Sample a one-way delivery delay.
    pub fn sample_latency(&self, rng: &mut impl Rng) -> Duration {
        if self.jitter.is_zero() {
            return self.base_latency;
        }
        let jitter_ns = rng.gen_range(0..=self.jitter.as_nanos() as u64);
        self.base_latency + Duration::from_nanos(jitter_ns)
    }
}

/// One live simulated connection between two nodes.
#[derive(Debug, Clone, Copy)]
struct Link {
    dialer: NodeIndex,
    acceptor: NodeIndex,
}

/// In-memory stand-in for the rendezvous transport.
///
/// Hands out identities, resolves connect-by-identity, and tracks which
/// connections are open. Delivery timing lives in the runner; this type is
/// pure bookkeeping.
#[derive(Debug, Default)]
pub struct SimulatedNetwork {
    identities: HashMap<PeerIdentity, NodeIndex>,
    links: HashMap<ConnectionId, Link>,
    next_conn: u64,
}

impl SimulatedNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire an identity for a node, as the rendezvous service would.
    pub fn acquire_identity(&mut self, node: NodeIndex) -> PeerIdentity {
        let identity = PeerIdentity::new(format!("peer-{node}"));
        self.identities.insert(identity.clone(), node);
        identity
    }

    /// Resolve an identity to its node, if registered.
    pub fn resolve(&self, identity: &PeerIdentity) -> Option<NodeIndex> {
        self.identities.get(identity).copied()
    }

    /// Open a connection from `dialer` to the node behind `identity`.
    ///
    /// Returns `None` when the identity is unknown; the runner turns that
    /// into a `ConnectionFailed` for the dialer.
    pub fn open(&mut self, dialer: NodeIndex, identity: &PeerIdentity) -> Option<ConnectionId> {
        let acceptor = self.resolve(identity)?;
        let conn = ConnectionId(self.next_conn);
        self.next_conn += 1;
        self.links.insert(conn, Link { dialer, acceptor });
        Some(conn)
    }

    /// Allocate an id for a dial that will fail. Nothing is linked; the
    /// runner only needs a handle to report the failure against.
    pub fn failed_dial(&mut self) -> ConnectionId {
        let conn = ConnectionId(self.next_conn);
        self.next_conn += 1;
        conn
    }

    /// The open connection dialed by `node`, if any.
    pub fn connection_of_dialer(&self, node: NodeIndex) -> Option<ConnectionId> {
        self.links
            .iter()
            .find(|(_, link)| link.dialer == node)
            .map(|(conn, _)| *conn)
    }

    /// Tear down a connection. Idempotent.
    pub fn close(&mut self, conn: ConnectionId) {
        self.links.remove(&conn);
    }

    /// Whether a connection is still open.
    pub fn is_open(&self, conn: ConnectionId) -> bool {
        self.links.contains_key(&conn)
    }

    /// The node on the other end of `conn` from `node`, if open.
    pub fn peer_of(&self, conn: ConnectionId, node: NodeIndex) -> Option<NodeIndex> {
        let link = self.links.get(&conn)?;
        if link.dialer == node {
            Some(link.acceptor)
        } else if link.acceptor == node {
            Some(link.dialer)
        } else {
            None
        }
    }

    /// Number of open connections.
    pub fn open_count(&self) -> usize {
        self.links.len()
    }
}
