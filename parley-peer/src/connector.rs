//! Boundary to the peer-connection capability.
//!
//! Sessions only ever talk to a [`PeerConnector`]; the capability reports back
//! through the [`EventSink`] it was built with. The webrtc-rs implementation
//! lives in [`crate::rtc`].

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parley_core::{IceCandidate, PeerId, SessionDescription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_local::TrackLocal;

/// Outbound media attached to every connector a session builds.
pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stable => "stable",
            Self::HaveLocalOffer => "have-local-offer",
            Self::HaveRemoteOffer => "have-remote-offer",
            Self::HaveLocalPranswer => "have-local-pranswer",
            Self::HaveRemotePranswer => "have-remote-pranswer",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Pre-agreed stream id; both sides create the channel themselves.
    pub negotiated_id: Option<u16>,
    pub ordered: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            negotiated_id: None,
            ordered: true,
        }
    }
}

impl ChannelOptions {
    pub fn negotiated(id: u16) -> Self {
        Self {
            negotiated_id: Some(id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPayload {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub kind: String,
    pub stream_id: String,
}

pub enum ConnectionEvent {
    NegotiationNeeded,
    IceCandidate(IceCandidate),
    StateChanged(ConnectionState),
    TrackAdded(RemoteTrack),
    /// A channel created by the remote side.
    ChannelAnnounced(Arc<dyn DataChannel>),
    ChannelOpened(String),
    ChannelMessage {
        label: String,
        payload: ChannelPayload,
    },
    ChannelClosed(String),
}

impl fmt::Debug for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegotiationNeeded => f.write_str("NegotiationNeeded"),
            Self::IceCandidate(c) => f.debug_tuple("IceCandidate").field(c).finish(),
            Self::StateChanged(s) => f.debug_tuple("StateChanged").field(s).finish(),
            Self::TrackAdded(t) => f.debug_tuple("TrackAdded").field(t).finish(),
            Self::ChannelAnnounced(c) => f.debug_tuple("ChannelAnnounced").field(&c.label()).finish(),
            Self::ChannelOpened(l) => f.debug_tuple("ChannelOpened").field(l).finish(),
            Self::ChannelMessage { label, .. } => {
                f.debug_struct("ChannelMessage").field("label", label).finish()
            }
            Self::ChannelClosed(l) => f.debug_tuple("ChannelClosed").field(l).finish(),
        }
    }
}

/// A connection event stamped with the connector that produced it.
#[derive(Debug)]
pub struct PeerEvent {
    pub peer_id: PeerId,
    pub generation: u64,
    pub event: ConnectionEvent,
}

/// Subscription handed to a connector when it is built.
#[derive(Clone)]
pub struct EventSink {
    peer_id: PeerId,
    generation: u64,
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl EventSink {
    pub fn new(peer_id: PeerId, generation: u64, tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self {
            peer_id,
            generation,
            tx,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Delivery fails silently once the owning session is gone.
    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.tx.send(PeerEvent {
            peer_id: self.peer_id.clone(),
            generation: self.generation,
            event,
        });
    }
}

#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn send_text(&self, text: String) -> Result<()>;

    async fn send_binary(&self, data: Bytes) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// One peer-connection instance. Description and candidate operations are
/// applied in call order.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    fn signaling_state(&self) -> SignalingState;

    fn connection_state(&self) -> ConnectionState;

    async fn local_description(&self) -> Option<SessionDescription>;

    /// `None` lets the connector pick an offer or an answer from its
    /// signaling state.
    async fn set_local_description(&self, description: Option<SessionDescription>) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn create_data_channel(
        &self,
        label: &str,
        options: ChannelOptions,
    ) -> Result<Arc<dyn DataChannel>>;

    async fn add_track(&self, track: LocalTrack) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn create(&self, sink: EventSink) -> Result<Arc<dyn PeerConnector>>;
}
