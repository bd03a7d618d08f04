use parley_core::{PeerId, RelayMessage, SignalEnvelope};
use tokio::sync::mpsc;

/// Commands a room actor receives from the sockets of its members.
#[derive(Debug)]
pub enum RoomCommand {
    /// A socket was admitted; `outbound` feeds its writer task.
    Join {
        peer_id: PeerId,
        outbound: mpsc::UnboundedSender<RelayMessage>,
    },

    /// A `signal` frame read from the member's socket.
    Signal {
        peer_id: PeerId,
        envelope: SignalEnvelope,
    },

    /// The member's socket closed.
    Leave { peer_id: PeerId },
}
