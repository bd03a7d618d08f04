pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Size of the binary slices a file transfer is split into.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Receipts whose relay latency exceeds this many milliseconds are marked delayed.
pub const DELAYED_RECEIPT_MS: i64 = 1000;

/// Negotiated data channel carrying chat frames.
pub const CHAT_CHANNEL_LABEL: &str = "text chat";
pub const CHAT_CHANNEL_ID: u16 = 50;

pub const DEFAULT_FILE_LABEL_PREFIX: &str = "image-";
