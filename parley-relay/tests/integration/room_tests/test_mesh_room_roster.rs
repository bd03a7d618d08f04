use parley_core::{PeerId, RelayMessage, RoomKind};
use parley_relay::RoomCommand;

use crate::integration::{create_test_room, init_tracing};
use crate::utils::TestMember;

#[tokio::test]
async fn test_mesh_room_roster() {
    init_tracing();

    let room_tx = create_test_room(RoomKind::MultiParty);

    let mut p1 = TestMember::join(&room_tx, "p1").await;
    assert_eq!(p1.recv().await, RelayMessage::ConnectedPeers(vec![]));

    let mut p2 = TestMember::join(&room_tx, "p2").await;
    assert_eq!(
        p2.recv().await,
        RelayMessage::ConnectedPeers(vec![PeerId::from("p1")])
    );
    assert_eq!(
        p1.recv().await,
        RelayMessage::ConnectedPeer(Some(PeerId::from("p2")))
    );

    let mut p3 = TestMember::join(&room_tx, "p3").await;
    assert_eq!(
        p3.recv().await,
        RelayMessage::ConnectedPeers(vec![PeerId::from("p1"), PeerId::from("p2")])
    );
    assert_eq!(
        p1.recv().await,
        RelayMessage::ConnectedPeer(Some(PeerId::from("p3")))
    );
    assert_eq!(
        p2.recv().await,
        RelayMessage::ConnectedPeer(Some(PeerId::from("p3")))
    );

    room_tx
        .send(RoomCommand::Leave {
            peer_id: PeerId::from("p2"),
        })
        .await
        .unwrap();

    let gone = RelayMessage::DisconnectedPeer(Some(PeerId::from("p2")));
    assert_eq!(p1.recv().await, gone);
    assert_eq!(p3.recv().await, gone);
}
