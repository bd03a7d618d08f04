mod chat;
mod peer;
mod room;
mod signaling;

pub use chat::{ChatFrame, ChatMessage, FileMetadata, Receipt};
pub use peer::PeerId;
pub use room::{RoomId, RoomIdError, RoomKind};
pub use signaling::{
    IceCandidate, IceServerConfig, RelayMessage, SdpType, SessionDescription, Signal,
    SignalEnvelope,
};
