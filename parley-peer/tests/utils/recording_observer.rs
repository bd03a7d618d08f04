use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parley_core::{ChatMessage, PeerId, Receipt};
use parley_peer::channel::ReceivedFile;
use parley_peer::{ConnectionState, RemoteTrack, SessionObserver};

#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Created { peer: PeerId, polite: bool },
    Closed(PeerId),
    State(PeerId, ConnectionState),
    Track(PeerId, RemoteTrack),
    Message(PeerId, ChatMessage),
    File(PeerId, ReceivedFile),
    Receipt(PeerId, Receipt),
    Reset(PeerId),
}

/// Observer that keeps every notification for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Observed) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }

    pub fn connected(&self, peer: &PeerId) -> usize {
        self.count(|e| matches!(e, Observed::State(p, ConnectionState::Connected) if p == peer))
    }

    pub fn messages(&self) -> Vec<(PeerId, String)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Observed::Message(peer, message) => Some((peer.clone(), message.text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Observed::Receipt(_, receipt) => Some(*receipt),
                _ => None,
            })
            .collect()
    }

    /// Polls until `predicate` holds for the recorded events.
    pub async fn wait_until(&self, predicate: impl Fn(&Self) -> bool) -> Result<()> {
        tokio::time::timeout(Duration::from_secs(3), async {
            while !predicate(self) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .context("timed out waiting for observer events")
    }

    fn record(&self, event: Observed) {
        self.events.borrow_mut().push(event);
    }
}

#[async_trait(?Send)]
impl SessionObserver for RecordingObserver {
    async fn on_session_created(&self, peer_id: &PeerId, polite: bool) {
        self.record(Observed::Created {
            peer: peer_id.clone(),
            polite,
        });
    }

    async fn on_session_closed(&self, peer_id: &PeerId) {
        self.record(Observed::Closed(peer_id.clone()));
    }

    async fn on_connection_state(&self, peer_id: &PeerId, state: ConnectionState) {
        self.record(Observed::State(peer_id.clone(), state));
    }

    async fn on_track(&self, peer_id: &PeerId, track: RemoteTrack) {
        self.record(Observed::Track(peer_id.clone(), track));
    }

    async fn on_message(&self, peer_id: &PeerId, message: ChatMessage) {
        self.record(Observed::Message(peer_id.clone(), message));
    }

    async fn on_file(&self, peer_id: &PeerId, file: ReceivedFile) {
        self.record(Observed::File(peer_id.clone(), file));
    }

    async fn on_receipt(&self, peer_id: &PeerId, receipt: Receipt, _delayed: bool) {
        self.record(Observed::Receipt(peer_id.clone(), receipt));
    }

    async fn on_reset(&self, peer_id: &PeerId) {
        self.record(Observed::Reset(peer_id.clone()));
    }
}
