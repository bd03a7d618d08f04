use crate::utils::DELAYED_RECEIPT_MS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    /// Milliseconds since the Unix epoch, also the message's correlation id.
    pub timestamp: i64,
}

/// Acknowledgement of a chat message or a completed file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Timestamp of the acknowledged message or file metadata.
    pub id: i64,
    pub timestamp: i64,
}

impl Receipt {
    pub fn is_delayed(&self) -> bool {
        self.timestamp.saturating_sub(self.id) > DELAYED_RECEIPT_MS
    }
}

/// Anything travelling over the chat channel. Receipts are told apart from
/// messages by their `id` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatFrame {
    Receipt(Receipt),
    Message(ChatMessage),
}

/// Header frame that precedes the binary chunks of a file transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub mime_type: String,
}
