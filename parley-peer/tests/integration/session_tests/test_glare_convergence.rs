use parley_core::SdpType;
use tokio::task::LocalSet;

use crate::integration::{Pair, init_tracing};

#[tokio::test]
async fn test_simultaneous_offers_converge() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = Pair::spawn();
            pair.connected(1).await;

            assert_eq!(pair.relay.descriptions_from("a", SdpType::Offer), 1);
            assert_eq!(pair.relay.descriptions_from("b", SdpType::Offer), 1);

            let polite = pair.a.factory.latest().unwrap();
            let impolite = pair.b.factory.latest().unwrap();
            assert_eq!(polite.applied_remote(), vec![SdpType::Offer]);
            assert_eq!(impolite.applied_remote(), vec![SdpType::Answer]);

            assert_eq!(pair.relay.resets_from("a"), 0);
            assert_eq!(pair.relay.resets_from("b"), 0);
            assert_eq!(pair.a.factory.created().len(), 1);
            assert_eq!(pair.b.factory.created().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn test_roles_survive_negotiation() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let pair = Pair::spawn();
            pair.connected(1).await;

            let polite = pair.ha.session.state();
            let impolite = pair.hb.session.state();
            assert!(polite.polite);
            assert!(!impolite.polite);
            assert!(!polite.making_offer && !impolite.making_offer);
            assert!(!polite.setting_remote_answer_pending);
            assert!(!impolite.setting_remote_answer_pending);
        })
        .await;
}
