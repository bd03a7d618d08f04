use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("webrtc: {0}")]
    Rtc(#[from] webrtc::Error),

    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("relay socket: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("relay connection is closed")]
    RelayClosed,

    #[error("no live connection")]
    NotConnected,

    #[error("operation not valid in signaling state {0}")]
    InvalidState(String),

    #[error("data channel '{0}' is not open")]
    ChannelClosed(String),

    #[error("chunk on '{0}' arrived before its metadata")]
    UnexpectedChunk(String),

    #[error("transfer '{label}' overflowed: expected {expected} bytes, got {received}")]
    TransferOverflow {
        label: String,
        expected: u64,
        received: u64,
    },
}

pub type Result<T> = std::result::Result<T, PeerError>;
