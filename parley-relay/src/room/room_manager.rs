use crate::room::{Room, RoomBehavior, RoomCommand, behavior_for};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parley_core::{PeerId, RelayMessage, RoomId, RoomKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const DEFAULT_ROOM_BUFFER: usize = 100;

/// Registry of live rooms. Rooms are created on first join and fall out of
/// the registry once their last member is gone: the registry only keeps weak
/// senders, member sockets hold the strong ones.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, mpsc::WeakSender<RoomCommand>>>,
    behavior_factory: Arc<dyn Fn(RoomKind) -> Box<dyn RoomBehavior> + Send + Sync>,
    buffer: usize,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(behavior_for, DEFAULT_ROOM_BUFFER)
    }
}

impl RoomManager {
    pub fn new<F>(behavior_factory: F, buffer: usize) -> Self
    where
        F: Fn(RoomKind) -> Box<dyn RoomBehavior> + Send + Sync + 'static,
    {
        Self {
            rooms: Arc::new(DashMap::new()),
            behavior_factory: Arc::new(behavior_factory),
            buffer: buffer.max(1),
        }
    }

    pub fn get_room_sender(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        match self.rooms.entry(room_id.clone()) {
            Entry::Occupied(mut entry) => {
                if let Some(sender) = entry.get().upgrade() {
                    return sender;
                }
                let sender = self.spawn_room(room_id);
                entry.insert(sender.downgrade());
                sender
            }
            Entry::Vacant(entry) => {
                let sender = self.spawn_room(room_id);
                entry.insert(sender.downgrade());
                sender
            }
        }
    }

    /// Admits `peer_id` into `room_id`, returning the sender the socket
    /// keeps for its later signals and its final leave.
    pub async fn join(
        &self,
        room_id: &RoomId,
        peer_id: PeerId,
        outbound: mpsc::UnboundedSender<RelayMessage>,
    ) -> Option<mpsc::Sender<RoomCommand>> {
        let mut cmd = RoomCommand::Join { peer_id, outbound };

        for _ in 0..2 {
            let sender = self.get_room_sender(room_id);
            match sender.send(cmd).await {
                Ok(()) => return Some(sender),
                Err(mpsc::error::SendError(returned)) => {
                    warn!("Room {} stopped before join, recreating", room_id);
                    self.rooms.remove(room_id);
                    cmd = returned;
                }
            }
        }

        None
    }

    pub fn room_count(&self) -> usize {
        self.rooms
            .iter()
            .filter(|entry| entry.value().upgrade().is_some())
            .count()
    }

    fn spawn_room(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        info!("Creating new room: {}", room_id);
        let (tx, rx) = mpsc::channel(self.buffer);
        let behavior = (self.behavior_factory)(room_id.kind());
        let room = Room::new(room_id.clone(), behavior, rx);

        let rooms = self.rooms.clone();
        let room_id = room_id.clone();
        tokio::spawn(async move {
            room.run().await;
            rooms.remove_if(&room_id, |_, weak| weak.upgrade().is_none());
        });

        tx
    }
}
