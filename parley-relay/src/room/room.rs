use crate::room::RoomContext;
use crate::room::room_behavior::RoomBehavior;
use crate::room::room_command::RoomCommand;
use parley_core::RoomId;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Actor owning one room. It runs until every holder of its command sender
/// is gone, which happens once the last member socket has left.
pub struct Room {
    room_id: RoomId,
    behavior: Box<dyn RoomBehavior>,
    ctx: RoomContext,
    command_rx: mpsc::Receiver<RoomCommand>,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        behavior: Box<dyn RoomBehavior>,
        command_rx: mpsc::Receiver<RoomCommand>,
    ) -> Self {
        Self {
            room_id,
            behavior,
            ctx: RoomContext::new(),
            command_rx,
        }
    }

    pub fn context(&self) -> RoomContext {
        self.ctx.clone()
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Room {} event loop finished", self.room_id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { peer_id, outbound } => {
                self.ctx.insert(peer_id.clone(), outbound);
                self.behavior.on_join(&self.ctx, peer_id).await;
            }

            RoomCommand::Signal { peer_id, envelope } => {
                if !self.ctx.contains_peer(&peer_id) {
                    debug!("Ignoring signal from non-member {}", peer_id);
                    return;
                }
                self.behavior.on_signal(&self.ctx, peer_id, envelope).await;
            }

            RoomCommand::Leave { peer_id } => {
                if self.ctx.remove(&peer_id) {
                    self.behavior.on_leave(&self.ctx, peer_id).await;
                }
            }
        }
    }
}
