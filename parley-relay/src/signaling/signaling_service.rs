use crate::config::RelayConfig;
use crate::room::RoomManager;
use std::sync::Arc;

/// Shared state of the HTTP router.
#[derive(Clone)]
pub struct SignalingService {
    pub(crate) rooms: RoomManager,
    config: Arc<RelayConfig>,
}

impl SignalingService {
    pub fn new(config: RelayConfig) -> Self {
        let rooms = RoomManager::new(crate::room::behavior_for, config.room_buffer);
        Self::with_rooms(config, rooms)
    }

    pub fn with_rooms(config: RelayConfig, rooms: RoomManager) -> Self {
        Self {
            rooms,
            config: Arc::new(config),
        }
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}
