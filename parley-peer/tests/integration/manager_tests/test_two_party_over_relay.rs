use std::net::SocketAddr;
use std::rc::Rc;
use std::sync::Arc;

use parley_core::{PeerId, RoomId, RoomKind};
use parley_peer::{ManagerHandle, RelayClient, SessionManager};
use parley_relay::SignalingService;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, LocalSet};

use crate::integration::{TestPeer, init_tracing};
use crate::utils::{MockNetwork, Observed};

async fn spawn_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = parley_relay::serve(listener, SignalingService::new(Default::default())).await;
    });

    addr
}

struct Participant {
    peer: TestPeer,
    manager: Rc<SessionManager>,
    handle: ManagerHandle,
    run: JoinHandle<()>,
}

async fn join(
    name: &str,
    network: &Arc<MockNetwork>,
    addr: SocketAddr,
    room: &RoomId,
) -> Participant {
    let client = RelayClient::connect(&format!("ws://{addr}"), room)
        .await
        .unwrap();
    let (sink, inbound) = client.into_parts();

    let peer = TestPeer::with_signaling(name, network, Arc::new(sink));
    let manager = SessionManager::new(room.kind(), peer.ctx.clone());
    let (tx, rx) = mpsc::unbounded_channel();
    let run = tokio::task::spawn_local(manager.clone().run(inbound, rx));

    Participant {
        peer,
        manager,
        handle: ManagerHandle::new(tx),
        run,
    }
}

fn created(observer: &crate::utils::RecordingObserver) -> Vec<bool> {
    observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Observed::Created { polite, .. } => Some(polite),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_two_party_call_over_relay() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let addr = spawn_relay().await;
            let room = RoomId::parse("4134710").unwrap();
            assert_eq!(room.kind(), RoomKind::TwoParty);

            let network = MockNetwork::new();
            network.pair("a", "b");
            let peer = PeerId::anonymous();

            let first = join("a", &network, addr, &room).await;
            first
                .peer
                .observer
                .wait_until(|o| o.count(|e| matches!(e, Observed::Created { .. })) == 1)
                .await
                .unwrap();

            let second = join("b", &network, addr, &room).await;
            for observer in [&first.peer.observer, &second.peer.observer] {
                observer
                    .wait_until(|o| o.connected(&peer) >= 1)
                    .await
                    .unwrap();
            }

            // The earlier arrival is told about the newcomer and turns polite.
            assert!(first.manager.session(&peer).unwrap().is_polite());
            assert!(!second.manager.session(&peer).unwrap().is_polite());

            let message = first.handle.send_chat("over the relay").unwrap();
            second
                .peer
                .observer
                .wait_until(|o| o.messages() == vec![(peer.clone(), "over the relay".to_owned())])
                .await
                .unwrap();
            first
                .peer
                .observer
                .wait_until(|o| o.receipts().iter().any(|r| r.id == message.timestamp))
                .await
                .unwrap();

            let Participant {
                peer: second_peer,
                manager: second_manager,
                handle: second_handle,
                run: second_run,
            } = second;
            second_handle.leave().unwrap();
            second_run.await.unwrap();
            drop(second_manager);
            drop(second_peer);

            // The remaining side starts over as the impolite newcomer-to-be.
            first
                .peer
                .observer
                .wait_until(|o| created(o).len() == 2)
                .await
                .unwrap();
            assert_eq!(created(&first.peer.observer), vec![false, false]);
            assert!(!first.manager.session(&peer).unwrap().is_polite());

            first.handle.leave().unwrap();
            first.run.await.unwrap();
            assert!(first.manager.peers().is_empty());
        })
        .await;
}
