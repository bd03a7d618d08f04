use std::time::Duration;

use parley_core::{PeerId, RelayMessage};
use parley_relay::RoomCommand;
use tokio::sync::mpsc;

/// Member inbox as seen by a room actor.
pub struct TestMember {
    pub peer_id: PeerId,
    pub rx: mpsc::UnboundedReceiver<RelayMessage>,
}

impl TestMember {
    pub async fn join(room_tx: &mpsc::Sender<RoomCommand>, name: &str) -> Self {
        let peer_id = PeerId::from(name);
        let (outbound, rx) = mpsc::unbounded_channel();
        room_tx
            .send(RoomCommand::Join {
                peer_id: peer_id.clone(),
                outbound,
            })
            .await
            .expect("room should accept join");

        Self { peer_id, rx }
    }

    pub async fn recv(&mut self) -> RelayMessage {
        tokio::time::timeout(Duration::from_millis(1000), self.rx.recv())
            .await
            .expect("timed out waiting for relay message")
            .expect("member channel closed")
    }

    pub fn assert_idle(&mut self) {
        assert!(
            self.rx.try_recv().is_err(),
            "{} received an unexpected message",
            self.peer_id
        );
    }
}
