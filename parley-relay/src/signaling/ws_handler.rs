use crate::{RoomCommand, SignalingService};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use parley_core::{PeerId, RelayMessage, RoomId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    State(service): State<SignalingService>,
) -> Response {
    let room_id = match RoomId::parse(&room) {
        Ok(room_id) => room_id,
        Err(e) => {
            debug!("Rejecting socket: {}", e);
            return (StatusCode::NOT_FOUND, e.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, room_id, service))
}

async fn handle_socket(socket: WebSocket, room_id: RoomId, service: SignalingService) {
    let peer_id = PeerId::new();
    info!("New WebSocket connection {} in room {}", peer_id, room_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<RelayMessage>();

    let _ = tx.send(RelayMessage::Welcome {
        peer_id: peer_id.clone(),
    });

    let Some(room_tx) = service.rooms.join(&room_id, peer_id.clone(), tx).await else {
        error!("Room {} unavailable, dropping {}", room_id, peer_id);
        return;
    };

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize relay message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let room_tx = room_tx.clone();
        let peer_id = peer_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<RelayMessage>(&text) {
                        Ok(RelayMessage::Signal(envelope)) => {
                            let cmd = RoomCommand::Signal {
                                peer_id: peer_id.clone(),
                                envelope,
                            };
                            if let Err(e) = room_tx.send(cmd).await {
                                error!("Room died: {}", e);
                                break;
                            }
                        }
                        Ok(other) => warn!("Ignoring client-sent {:?} from {}", other, peer_id),
                        Err(e) => warn!("Invalid frame from {}: {}", peer_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    let _ = room_tx
        .send(RoomCommand::Leave {
            peer_id: peer_id.clone(),
        })
        .await;
    info!("WebSocket disconnected: {}", peer_id);
}
