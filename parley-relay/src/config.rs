use crate::room::DEFAULT_ROOM_BUFFER;
use clap::Parser;
use std::net::SocketAddr;

#[derive(Debug, Clone, Parser)]
#[command(name = "parley-relay", about = "Signaling relay for perfect-negotiation peers")]
pub struct RelayConfig {
    /// Address to bind
    #[arg(long, env = "PARLEY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PARLEY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Capacity of each room's command queue
    #[arg(long, env = "PARLEY_ROOM_BUFFER", default_value_t = DEFAULT_ROOM_BUFFER)]
    pub room_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            room_buffer: DEFAULT_ROOM_BUFFER,
        }
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
