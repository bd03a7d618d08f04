//! Chat and file delivery over established data channels.

mod hub;
mod queue;
mod transfer;

pub use hub::ChannelHub;
pub use queue::PendingQueue;
pub use transfer::{FileAssembler, OutgoingFile, ReceivedFile, chunk, transfer_label};

use parley_core::{ChatMessage, Receipt};

/// Something waiting to be delivered to the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Chat(ChatMessage),
    Receipt(Receipt),
    File(OutgoingFile),
}

/// Something the remote peer delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(ChatMessage),
    Receipt(Receipt),
    File(ReceivedFile),
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn receipt_for(id: i64) -> Receipt {
    Receipt {
        id,
        timestamp: now_millis(),
    }
}
