use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;
use parley_core::PeerId;
use parley_core::utils::CHAT_CHANNEL_LABEL;
use parley_peer::channel::OutgoingFile;
use parley_peer::{
    ChannelPayload, ConnectionEvent, DataChannel, PeerConfig, PeerSession, Route, SessionInput,
};
use tokio::task::LocalSet;

use crate::integration::{Pair, TestPeer, eventually, init_tracing};
use crate::utils::{LocalRelay, MockConnector, MockDataChannel, MockNetwork};

/// Pair whose `b` side does not recognise `a`'s transfer channels, so
/// nothing `a` sends is ever acknowledged by `b` itself.
fn pair_without_file_receipts() -> Pair {
    let network = MockNetwork::new();
    let relay = LocalRelay::start();
    network.pair("a", "b");
    relay.pair("a", "b");

    let a = TestPeer::new("a", &network, &relay);
    let mut b = TestPeer::new("b", &network, &relay);
    b.ctx.config = Rc::new(PeerConfig {
        file_label_prefix: "other-".into(),
        ..PeerConfig::default()
    });

    let ha = PeerSession::spawn(PeerId::anonymous(), Route::Broadcast, true, a.ctx.clone());
    let hb = PeerSession::spawn(PeerId::anonymous(), Route::Broadcast, false, b.ctx.clone());
    relay.attach_session("a", &ha);
    relay.attach_session("b", &hb);

    Pair {
        network,
        relay,
        a,
        b,
        ha,
        hb,
    }
}

fn transfer_channel(connector: &MockConnector) -> Option<Arc<MockDataChannel>> {
    connector
        .channels()
        .into_iter()
        .find(|c| c.label().starts_with("image-"))
}

fn receipt_json(id: i64) -> String {
    format!(r#"{{"id":{id},"timestamp":{id}}}"#)
}

#[tokio::test]
async fn test_only_the_transfer_channel_receipt_closes_it() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = pair_without_file_receipts();
            pair.connected(1).await;

            let file = OutgoingFile::new("notes.txt", "text/plain", Bytes::from_static(b"hello"));
            let id = file.metadata.timestamp;
            pair.ha.send(SessionInput::File(file));

            let connector = pair.a.factory.latest().unwrap();
            eventually(|| transfer_channel(&connector).is_some_and(|c| c.sent().len() == 2))
                .await
                .unwrap();
            let transfer = transfer_channel(&connector).unwrap();

            // A chat receipt stamped in the same millisecond is not the file's.
            connector.emit(ConnectionEvent::ChannelMessage {
                label: CHAT_CHANNEL_LABEL.to_owned(),
                payload: ChannelPayload::Text(receipt_json(id)),
            });
            pair.a
                .observer
                .wait_until(|o| o.receipts().len() == 1)
                .await
                .unwrap();
            assert!(transfer.is_open());

            connector.emit(ConnectionEvent::ChannelMessage {
                label: transfer.label().to_owned(),
                payload: ChannelPayload::Text(receipt_json(id)),
            });
            eventually(|| !transfer.is_open()).await.unwrap();
            assert_eq!(pair.a.observer.receipts().len(), 2);
        })
        .await;
}

#[tokio::test]
async fn test_reset_requeues_unacknowledged_transfer() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = pair_without_file_receipts();
            pair.connected(1).await;

            let file = OutgoingFile::new("notes.txt", "text/plain", Bytes::from_static(b"hello"));
            pair.ha.send(SessionInput::File(file.clone()));

            let first = pair.a.factory.latest().unwrap();
            eventually(|| transfer_channel(&first).is_some_and(|c| c.sent().len() == 2))
                .await
                .unwrap();

            pair.ha.session.reset().await;
            pair.connected(2).await;

            let second = pair.a.factory.latest().unwrap();
            assert_eq!(second.generation(), first.generation() + 1);
            eventually(|| transfer_channel(&second).is_some_and(|c| c.sent().len() == 2))
                .await
                .unwrap();

            let resent = transfer_channel(&second).unwrap();
            assert_eq!(
                resent.label(),
                format!("image-{}-notes.txt", file.metadata.timestamp)
            );
            assert_eq!(resent.sent()[1], ChannelPayload::Binary(file.data.clone()));
            assert_eq!(pair.ha.session.hub().pending_len(), 0);
        })
        .await;
}
