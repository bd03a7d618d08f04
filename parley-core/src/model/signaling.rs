use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SdpType {
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "answer")]
    Answer,
    #[serde(rename = "pranswer")]
    Pranswer,
    #[serde(rename = "rollback")]
    Rollback,
    /// Out-of-band control description asking the remote side to rebuild its
    /// connection.
    #[serde(rename = "_reset")]
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: Some(sdp.into()),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: Some(sdp.into()),
        }
    }

    pub fn reset_marker() -> Self {
        Self {
            sdp_type: SdpType::Reset,
            sdp: None,
        }
    }

    pub fn is_reset_marker(&self) -> bool {
        self.sdp_type == SdpType::Reset
    }
}

/// Trickle ICE candidate in the browser's JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    /// End-of-candidates markers carry an empty (or one character) payload.
    pub fn is_trivial(&self) -> bool {
        self.candidate.len() <= 1
    }
}

/// Payload of a signal: exactly one description or one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Description(SessionDescription),
    Candidate(IceCandidate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalEnvelope {
    /// Multi-party rooms: unicast to `to`, tagged with the sender.
    Addressed {
        to: PeerId,
        from: PeerId,
        signal: Signal,
    },
    /// Two-party rooms: broadcast to the other member, no addressing.
    Broadcast(Signal),
}

impl SignalEnvelope {
    pub fn signal(&self) -> &Signal {
        match self {
            Self::Addressed { signal, .. } => signal,
            Self::Broadcast(signal) => signal,
        }
    }

    pub fn into_signal(self) -> Signal {
        match self {
            Self::Addressed { signal, .. } => signal,
            Self::Broadcast(signal) => signal,
        }
    }

    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Self::Addressed { from, .. } => Some(from),
            Self::Broadcast(_) => None,
        }
    }

    pub fn recipient(&self) -> Option<&PeerId> {
        match self {
            Self::Addressed { to, .. } => Some(to),
            Self::Broadcast(_) => None,
        }
    }
}

/// Frames exchanged between the relay and a participant socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum RelayMessage {
    /// First frame on every admitted socket: the identity the relay assigned it.
    #[serde(rename = "welcome")]
    Welcome { peer_id: PeerId },
    /// A participant arrived. Anonymous in two-party rooms.
    #[serde(rename = "connected peer")]
    ConnectedPeer(Option<PeerId>),
    /// Roster of members already present, sent to the arriving socket only.
    #[serde(rename = "connected peers")]
    ConnectedPeers(Vec<PeerId>),
    #[serde(rename = "disconnected peer")]
    DisconnectedPeer(Option<PeerId>),
    #[serde(rename = "signal")]
    Signal(SignalEnvelope),
}
