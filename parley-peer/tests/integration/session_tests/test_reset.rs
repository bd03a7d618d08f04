use std::time::Duration;

use parley_core::{PeerId, SdpType, SessionDescription, Signal};
use parley_peer::{
    ConnectionEvent, ConnectionState, NegotiationState, PeerSession, Route, SessionInput,
};
use tokio::task::LocalSet;

use crate::integration::{Pair, TestPeer, eventually, init_tracing};
use crate::utils::{LocalRelay, MockNetwork, Observed};

#[tokio::test]
async fn test_failed_remote_description_resets_both_sides_once() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = Pair::spawn();
            pair.a.factory.fail_next_remote_description();
            pair.connected(1).await;

            tokio::time::sleep(Duration::from_millis(100)).await;

            assert_eq!(pair.relay.resets_from("a"), 1);
            assert_eq!(pair.relay.resets_from("b"), 0);
            assert_eq!(pair.a.factory.created().len(), 2);
            assert_eq!(pair.b.factory.created().len(), 2);
            assert_eq!(pair.a.observer.count(|e| matches!(e, Observed::Reset(_))), 1);
            assert_eq!(pair.b.observer.count(|e| matches!(e, Observed::Reset(_))), 1);

            // The polite side waited for the fresh offer instead of racing it.
            assert_eq!(pair.relay.descriptions_from("a", SdpType::Offer), 1);
            assert!(!pair.ha.session.state().suppressing_initial_offer);
        })
        .await;
}

#[tokio::test]
async fn test_reset_is_idempotent() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let network = MockNetwork::new();
            let relay = LocalRelay::start();
            let a = TestPeer::new("a", &network, &relay);
            let ha = PeerSession::spawn(PeerId::anonymous(), Route::Broadcast, true, a.ctx.clone());

            eventually(|| relay.descriptions_from("a", SdpType::Offer) == 1)
                .await
                .unwrap();

            ha.session.reset().await;
            let once = ha.session.state();
            ha.session.reset().await;
            let twice = ha.session.state();

            let expected = NegotiationState {
                suppressing_initial_offer: true,
                ..NegotiationState::new(true)
            };
            assert_eq!(once, expected);
            assert_eq!(twice, expected);
            assert_eq!(ha.session.generation(), 3);

            let created = a.factory.created();
            assert_eq!(created.len(), 3);
            assert!(created[0].is_closed());
            assert!(created[1].is_closed());
            assert!(!created[2].is_closed());

            eventually(|| relay.resets_from("a") == 2).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(relay.descriptions_from("a", SdpType::Offer), 1);
        })
        .await;
}

#[tokio::test]
async fn test_impolite_reset_emits_no_marker() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let network = MockNetwork::new();
            let relay = LocalRelay::start();
            let b = TestPeer::new("b", &network, &relay);
            let hb =
                PeerSession::spawn(PeerId::anonymous(), Route::Broadcast, false, b.ctx.clone());

            eventually(|| relay.descriptions_from("b", SdpType::Offer) == 1)
                .await
                .unwrap();

            hb.session.reset().await;
            assert!(!hb.session.state().suppressing_initial_offer);

            eventually(|| relay.descriptions_from("b", SdpType::Offer) == 2)
                .await
                .unwrap();
            assert_eq!(relay.resets_from("b"), 0);
        })
        .await;
}

#[tokio::test]
async fn test_events_of_discarded_connector_are_ignored() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let network = MockNetwork::new();
            let relay = LocalRelay::start();
            let a = TestPeer::new("a", &network, &relay);
            let ha = PeerSession::spawn(PeerId::anonymous(), Route::Broadcast, true, a.ctx.clone());

            eventually(|| a.factory.created().len() == 1).await.unwrap();
            let discarded = a.factory.latest().unwrap();

            ha.session.reset().await;
            let current = a.factory.latest().unwrap();
            assert_eq!(current.generation(), discarded.generation() + 1);

            discarded.emit(ConnectionEvent::StateChanged(ConnectionState::Connected));
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(a.observer.connected(&PeerId::anonymous()), 0);

            current.emit(ConnectionEvent::StateChanged(ConnectionState::Connected));
            a.observer
                .wait_until(|o| o.connected(&PeerId::anonymous()) == 1)
                .await
                .unwrap();
        })
        .await;
}

#[tokio::test]
async fn test_failure_on_discarded_connector_does_not_reset_again() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let network = MockNetwork::new();
            let relay = LocalRelay::start();
            let a = TestPeer::new("a", &network, &relay);
            let ha = PeerSession::spawn(PeerId::anonymous(), Route::Broadcast, true, a.ctx.clone());

            eventually(|| relay.descriptions_from("a", SdpType::Offer) == 1)
                .await
                .unwrap();

            // The reset replaces the connector while the answer is still being applied.
            let description = |d: SessionDescription| SessionInput::Signal(Signal::Description(d));
            assert!(ha.send(description(SessionDescription::answer("v=0"))));
            assert!(ha.send(description(SessionDescription::reset_marker())));

            a.observer
                .wait_until(|o| o.count(|e| matches!(e, Observed::Reset(_))) == 1)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;

            assert_eq!(a.observer.count(|e| matches!(e, Observed::Reset(_))), 1);
            assert_eq!(relay.resets_from("a"), 1);
            assert_eq!(a.factory.created().len(), 2);
            assert_eq!(ha.session.generation(), 2);
        })
        .await;
}
