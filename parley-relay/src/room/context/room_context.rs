use dashmap::DashMap;
use parley_core::{PeerId, RelayMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct Member {
    outbound: mpsc::UnboundedSender<RelayMessage>,
    joined_at: u64,
}

/// Membership of a single room plus the means to reach each member's socket.
/// Cheap to clone; clones share the same membership.
#[derive(Clone, Default)]
pub struct RoomContext {
    members: Arc<DashMap<PeerId, Member>>,
    join_counter: Arc<AtomicU64>,
}

impl RoomContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a member. Re-admitting an existing identity replaces its socket.
    pub(crate) fn insert(&self, peer_id: PeerId, outbound: mpsc::UnboundedSender<RelayMessage>) {
        let joined_at = self.join_counter.fetch_add(1, Ordering::Relaxed);
        self.members.insert(peer_id, Member { outbound, joined_at });
    }

    pub(crate) fn remove(&self, peer_id: &PeerId) -> bool {
        self.members.remove(peer_id).is_some()
    }

    /// Delivers a frame to one member.
    pub fn send(&self, peer_id: &PeerId, msg: RelayMessage) {
        let Some(member) = self.members.get(peer_id) else {
            warn!("Attempted to send to absent member {}", peer_id);
            return;
        };

        if member.outbound.send(msg).is_err() {
            debug!("Socket writer for {} already gone", peer_id);
        }
    }

    /// Delivers a frame to every member except `skip`.
    pub fn broadcast_except(&self, skip: &PeerId, msg: RelayMessage) {
        let targets: Vec<_> = self
            .members
            .iter()
            .filter(|entry| entry.key() != skip)
            .map(|entry| (entry.key().clone(), entry.value().outbound.clone()))
            .collect();

        for (peer_id, outbound) in targets {
            if outbound.send(msg.clone()).is_err() {
                debug!("Socket writer for {} already gone", peer_id);
            }
        }
    }

    pub fn broadcast(&self, msg: RelayMessage) {
        let targets: Vec<_> = self
            .members
            .iter()
            .map(|entry| entry.value().outbound.clone())
            .collect();

        for outbound in targets {
            let _ = outbound.send(msg.clone());
        }
    }

    /// Current members in the order they joined.
    pub fn list_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self
            .members
            .iter()
            .map(|entry| (entry.value().joined_at, entry.key().clone()))
            .collect();
        peers.sort_by_key(|(joined_at, _)| *joined_at);
        peers.into_iter().map(|(_, peer_id)| peer_id).collect()
    }

    pub fn contains_peer(&self, peer_id: &PeerId) -> bool {
        self.members.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
