use crate::channel::ReceivedFile;
use crate::connector::{ConnectionState, RemoteTrack};
use async_trait::async_trait;
use parley_core::{ChatMessage, PeerId, Receipt};

/// Application-facing notifications of the session manager. Every method
/// defaults to doing nothing.
#[async_trait(?Send)]
pub trait SessionObserver {
    async fn on_session_created(&self, _peer_id: &PeerId, _polite: bool) {}

    async fn on_session_closed(&self, _peer_id: &PeerId) {}

    async fn on_connection_state(&self, _peer_id: &PeerId, _state: ConnectionState) {}

    async fn on_track(&self, _peer_id: &PeerId, _track: RemoteTrack) {}

    async fn on_message(&self, _peer_id: &PeerId, _message: ChatMessage) {}

    async fn on_file(&self, _peer_id: &PeerId, _file: ReceivedFile) {}

    /// `delayed` is set when the receipt arrived more than a second after
    /// the acknowledged payload was stamped.
    async fn on_receipt(&self, _peer_id: &PeerId, _receipt: Receipt, _delayed: bool) {}

    async fn on_reset(&self, _peer_id: &PeerId) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
