use parley_core::IceServerConfig;
use parley_core::utils::{DEFAULT_CHUNK_SIZE, DEFAULT_FILE_LABEL_PREFIX, DEFAULT_STUN_ADDR};

#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Base websocket URL of the relay, without the room segment.
    pub relay_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    /// Size of the binary chunks a file is split into.
    pub chunk_size: usize,
    /// Label prefix of file transfer channels.
    pub file_label_prefix: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:3000".to_string(),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_string()],
                username: None,
                credential: None,
            }],
            chunk_size: DEFAULT_CHUNK_SIZE,
            file_label_prefix: DEFAULT_FILE_LABEL_PREFIX.to_string(),
        }
    }
}
