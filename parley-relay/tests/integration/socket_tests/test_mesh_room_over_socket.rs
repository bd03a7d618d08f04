use parley_core::{IceCandidate, RelayMessage, Signal, SignalEnvelope};

use crate::integration::init_tracing;
use crate::utils::{TestSocket, spawn_relay};

#[tokio::test]
async fn test_mesh_room_over_socket() {
    init_tracing();

    let addr = spawn_relay().await;
    let room = "abcd-efgh-ijkl";

    let mut p1 = TestSocket::connect(addr, room).await.unwrap();
    assert_eq!(
        p1.next_message(1000).await.unwrap(),
        RelayMessage::ConnectedPeers(vec![])
    );

    let mut p2 = TestSocket::connect(addr, room).await.unwrap();
    assert_eq!(
        p2.next_message(1000).await.unwrap(),
        RelayMessage::ConnectedPeers(vec![p1.peer_id.clone()])
    );
    assert_eq!(
        p1.next_message(1000).await.unwrap(),
        RelayMessage::ConnectedPeer(Some(p2.peer_id.clone()))
    );

    let signal = Signal::Candidate(IceCandidate::new("candidate:1 1 udp 1 10.0.0.1 9 typ host"));
    p2.send(&RelayMessage::Signal(SignalEnvelope::Addressed {
        to: p1.peer_id.clone(),
        from: p2.peer_id.clone(),
        signal: signal.clone(),
    }))
    .await
    .unwrap();

    assert_eq!(
        p1.next_message(1000).await.unwrap(),
        RelayMessage::Signal(SignalEnvelope::Addressed {
            to: p1.peer_id.clone(),
            from: p2.peer_id.clone(),
            signal,
        })
    );

    let p2_id = p2.peer_id.clone();
    p2.close().await.unwrap();
    assert_eq!(
        p1.next_message(1000).await.unwrap(),
        RelayMessage::DisconnectedPeer(Some(p2_id))
    );
}
