use parley_core::{ChatMessage, PeerId};
use parley_core::utils::CHAT_CHANNEL_LABEL;
use parley_peer::{DataChannel, SessionInput};
use parley_peer::channel::now_millis;
use tokio::task::LocalSet;

use crate::integration::{Pair, eventually, init_tracing};

fn chat(text: &str) -> ChatMessage {
    ChatMessage {
        text: text.to_owned(),
        timestamp: now_millis(),
    }
}

#[tokio::test]
async fn test_messages_sent_before_connecting_arrive_in_order() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = Pair::spawn();
            for text in ["one", "two", "three"] {
                assert!(pair.ha.send(SessionInput::Chat(chat(text))));
            }

            pair.b
                .observer
                .wait_until(|o| o.messages().len() == 3)
                .await
                .unwrap();

            let texts: Vec<_> = pair.b.observer.messages().into_iter().map(|(_, t)| t).collect();
            assert_eq!(texts, vec!["one", "two", "three"]);
            assert!(
                pair.b
                    .observer
                    .messages()
                    .iter()
                    .all(|(peer, _)| *peer == PeerId::anonymous())
            );

            pair.a
                .observer
                .wait_until(|o| o.receipts().len() == 3)
                .await
                .unwrap();
            assert_eq!(pair.ha.session.hub().pending_len(), 0);
        })
        .await;
}

#[tokio::test]
async fn test_failed_send_is_requeued_ahead_of_later_messages() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = Pair::spawn();
            pair.connected(1).await;

            let connector = pair.a.factory.latest().unwrap();
            let chat_channel = connector
                .channels()
                .into_iter()
                .find(|c| c.label() == CHAT_CHANNEL_LABEL)
                .unwrap();
            eventually(|| pair.ha.session.hub().chat_open()).await.unwrap();

            chat_channel.set_failing(true);
            pair.ha.send(SessionInput::Chat(chat("first")));
            eventually(|| pair.ha.session.hub().pending_len() == 1)
                .await
                .unwrap();

            chat_channel.set_failing(false);
            pair.ha.send(SessionInput::Chat(chat("second")));

            pair.b
                .observer
                .wait_until(|o| o.messages().len() == 2)
                .await
                .unwrap();
            let texts: Vec<_> = pair.b.observer.messages().into_iter().map(|(_, t)| t).collect();
            assert_eq!(texts, vec!["first", "second"]);
        })
        .await;
}

#[tokio::test]
async fn test_receipts_carry_the_message_timestamp() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = Pair::spawn();
            pair.connected(1).await;

            let message = chat("ping");
            pair.hb.send(SessionInput::Chat(message.clone()));

            pair.b
                .observer
                .wait_until(|o| o.receipts().len() == 1)
                .await
                .unwrap();
            let receipt = pair.b.observer.receipts()[0];
            assert_eq!(receipt.id, message.timestamp);
            assert!(receipt.timestamp >= message.timestamp);
            assert!(!receipt.is_delayed());
        })
        .await;
}
