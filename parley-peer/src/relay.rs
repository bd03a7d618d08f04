use crate::error::{PeerError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parley_core::{RelayMessage, RoomId, SignalEnvelope};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Where sessions hand their outbound signals.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_signal(&self, envelope: SignalEnvelope) -> Result<()>;
}

/// Write half of a relay connection.
#[derive(Clone)]
pub struct RelaySink {
    tx: mpsc::UnboundedSender<RelayMessage>,
}

#[async_trait]
impl SignalingOutput for RelaySink {
    async fn send_signal(&self, envelope: SignalEnvelope) -> Result<()> {
        self.tx
            .send(RelayMessage::Signal(envelope))
            .map_err(|_| PeerError::RelayClosed)
    }
}

/// Websocket connection to the signaling relay for one room.
pub struct RelayClient {
    pub sink: RelaySink,
    pub inbound: mpsc::UnboundedReceiver<RelayMessage>,
}

impl RelayClient {
    /// Joins `room` on the relay at `base_url` (`ws://host:port`).
    pub async fn connect(base_url: &str, room: &RoomId) -> Result<Self> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), room);
        let (stream, _) = connect_async(url.as_str()).await?;
        info!("Connected to relay at {}", url);

        let (mut write, mut read) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RelayMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<RelayMessage>();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize relay message: {}", e);
                        continue;
                    }
                };
                if write.send(Message::text(json)).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            while let Some(Ok(frame)) = read.next().await {
                match frame {
                    Message::Text(text) => match serde_json::from_str::<RelayMessage>(text.as_str()) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid relay frame: {}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            debug!("Relay reader finished");
        });

        Ok(Self {
            sink: RelaySink { tx: out_tx },
            inbound: in_rx,
        })
    }

    pub fn into_parts(self) -> (RelaySink, mpsc::UnboundedReceiver<RelayMessage>) {
        (self.sink, self.inbound)
    }
}
