//! Peer registry — every host seen announcing itself on the local network.
//!
//! Written by the discovery listener, read by everyone else through
//! [`PeerRegistry::snapshot`]. Peers are never removed: a host that goes
//! offline stays listed until the process exits.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Shared handle to the set of discovered peer addresses.
///
/// Cloning is cheap; all clones see the same set.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    /// Value is the moment the peer was first seen.
    peers: Arc<DashMap<IpAddr, Instant>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `addr` if absent. Returns true only for the first sighting.
    ///
    /// Atomic per key: two listeners racing on the same address see exactly
    /// one `true`.
    pub fn insert(&self, addr: IpAddr) -> bool {
        match self.peers.entry(addr) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.peers.contains_key(addr)
    }

    /// When `addr` first announced itself, if it ever did.
    pub fn first_seen(&self, addr: &IpAddr) -> Option<Instant> {
        self.peers.get(addr).map(|e| *e.value())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// All known peers, sorted ascending.
    pub fn snapshot(&self) -> Vec<IpAddr> {
        let mut peers: Vec<IpAddr> = self.peers.iter().map(|e| *e.key()).collect();
        peers.sort();
        peers
    }
}
