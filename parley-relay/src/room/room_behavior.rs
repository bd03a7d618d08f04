use crate::room::RoomContext;
use async_trait::async_trait;
use parley_core::{PeerId, RelayMessage, RoomKind, SignalEnvelope};
use tracing::{debug, info, warn};

/// Fan-out policy of a room. The room actor updates membership before
/// `on_join` and after `on_leave`'s removal, so `ctx` always reflects the
/// current members.
#[async_trait]
pub trait RoomBehavior: Send + Sync + 'static {
    async fn on_join(&self, ctx: &RoomContext, peer_id: PeerId);

    async fn on_signal(&self, ctx: &RoomContext, peer_id: PeerId, envelope: SignalEnvelope);

    async fn on_leave(&self, ctx: &RoomContext, peer_id: PeerId);
}

/// Default behavior for each room shape.
pub fn behavior_for(kind: RoomKind) -> Box<dyn RoomBehavior> {
    match kind {
        RoomKind::TwoParty => Box::new(PairRoom),
        RoomKind::MultiParty => Box::new(MeshRoom),
    }
}

/// Two members, no addressing: every signal goes to everyone else.
pub struct PairRoom;

#[async_trait]
impl RoomBehavior for PairRoom {
    async fn on_join(&self, ctx: &RoomContext, peer_id: PeerId) {
        if ctx.len() > 2 {
            warn!("Pair room now has {} members", ctx.len());
        }
        info!("Peer {} joined pair room", peer_id);

        ctx.broadcast_except(&peer_id, RelayMessage::ConnectedPeer(None));
    }

    async fn on_signal(&self, ctx: &RoomContext, peer_id: PeerId, envelope: SignalEnvelope) {
        let SignalEnvelope::Broadcast(signal) = envelope else {
            warn!("Dropping addressed signal from {} in pair room", peer_id);
            return;
        };

        ctx.broadcast_except(
            &peer_id,
            RelayMessage::Signal(SignalEnvelope::Broadcast(signal)),
        );
    }

    async fn on_leave(&self, ctx: &RoomContext, peer_id: PeerId) {
        info!("Peer {} left pair room", peer_id);
        ctx.broadcast(RelayMessage::DisconnectedPeer(None));
    }
}

/// Any number of members. Arrivals receive the roster, signals are unicast to
/// their `to` and stamped with the socket's real identity.
pub struct MeshRoom;

#[async_trait]
impl RoomBehavior for MeshRoom {
    async fn on_join(&self, ctx: &RoomContext, peer_id: PeerId) {
        let roster: Vec<PeerId> = ctx
            .list_peers()
            .into_iter()
            .filter(|member| member != &peer_id)
            .collect();
        info!("Peer {} joined mesh room with {} others", peer_id, roster.len());

        ctx.send(&peer_id, RelayMessage::ConnectedPeers(roster));
        ctx.broadcast_except(&peer_id, RelayMessage::ConnectedPeer(Some(peer_id.clone())));
    }

    async fn on_signal(&self, ctx: &RoomContext, peer_id: PeerId, envelope: SignalEnvelope) {
        let SignalEnvelope::Addressed { to, from, signal } = envelope else {
            warn!("Dropping unaddressed signal from {} in mesh room", peer_id);
            return;
        };

        if from != peer_id {
            debug!("Rewriting claimed sender {} to {}", from, peer_id);
        }

        if !ctx.contains_peer(&to) {
            warn!("Dropping signal from {} to unknown peer {}", peer_id, to);
            return;
        }

        let target = to.clone();
        ctx.send(
            &target,
            RelayMessage::Signal(SignalEnvelope::Addressed {
                to,
                from: peer_id,
                signal,
            }),
        );
    }

    async fn on_leave(&self, ctx: &RoomContext, peer_id: PeerId) {
        info!("Peer {} left mesh room", peer_id);
        ctx.broadcast(RelayMessage::DisconnectedPeer(Some(peer_id)));
    }
}
