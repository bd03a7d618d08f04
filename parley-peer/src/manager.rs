use crate::channel::{OutgoingFile, now_millis};
use crate::error::{PeerError, Result};
use crate::session::{PeerSession, Route, SessionContext, SessionHandle, SessionInput};
use bytes::Bytes;
use parley_core::{ChatMessage, FileMetadata, PeerId, RelayMessage, RoomKind, SignalEnvelope};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum ManagerCommand {
    Chat(ChatMessage),
    File(OutgoingFile),
    Leave,
}

/// Application side of a running [`SessionManager`].
#[derive(Clone)]
pub struct ManagerHandle {
    tx: mpsc::UnboundedSender<ManagerCommand>,
}

impl ManagerHandle {
    pub fn new(tx: mpsc::UnboundedSender<ManagerCommand>) -> Self {
        Self { tx }
    }

    /// Sends `text` to every peer and returns the message as stamped.
    pub fn send_chat(&self, text: impl Into<String>) -> Result<ChatMessage> {
        let message = ChatMessage {
            text: text.into(),
            timestamp: now_millis(),
        };
        self.command(ManagerCommand::Chat(message.clone()))?;
        Ok(message)
    }

    pub fn send_file(
        &self,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Bytes,
    ) -> Result<FileMetadata> {
        let file = OutgoingFile::new(name, mime_type, data);
        let metadata = file.metadata.clone();
        self.command(ManagerCommand::File(file))?;
        Ok(metadata)
    }

    pub fn leave(&self) -> Result<()> {
        self.command(ManagerCommand::Leave)
    }

    fn command(&self, cmd: ManagerCommand) -> Result<()> {
        self.tx.send(cmd).map_err(|_| PeerError::RelayClosed)
    }
}

/// Owns one session per remote peer and routes relay traffic to them.
///
/// Two-party rooms never reveal identities, so they have a single implicit
/// session keyed by [`PeerId::anonymous`]. Must run inside a `LocalSet`.
pub struct SessionManager {
    kind: RoomKind,
    local_id: RefCell<Option<PeerId>>,
    sessions: RefCell<HashMap<PeerId, SessionHandle>>,
    ctx: SessionContext,
}

impl SessionManager {
    pub fn new(kind: RoomKind, ctx: SessionContext) -> Rc<Self> {
        Rc::new(Self {
            kind,
            local_id: RefCell::new(None),
            sessions: RefCell::new(HashMap::new()),
            ctx,
        })
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    pub fn local_id(&self) -> Option<PeerId> {
        self.local_id.borrow().clone()
    }

    pub fn session(&self, peer_id: &PeerId) -> Option<Rc<PeerSession>> {
        self.sessions
            .borrow()
            .get(peer_id)
            .map(|handle| handle.session.clone())
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.sessions.borrow().keys().cloned().collect();
        peers.sort();
        peers
    }

    /// Processes relay traffic and application commands until the relay
    /// closes or the application leaves, then closes every session.
    pub async fn run(
        self: Rc<Self>,
        mut inbound: mpsc::UnboundedReceiver<RelayMessage>,
        mut commands: mpsc::UnboundedReceiver<ManagerCommand>,
    ) {
        loop {
            tokio::select! {
                msg = inbound.recv() => match msg {
                    Some(msg) => self.handle_relay_message(msg),
                    None => {
                        info!("Relay connection closed");
                        break;
                    }
                },
                cmd = commands.recv() => match cmd {
                    Some(ManagerCommand::Leave) | None => {
                        info!("Leaving room");
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                },
            }
        }

        self.close_all().await;
    }

    pub fn handle_relay_message(&self, msg: RelayMessage) {
        match (self.kind, msg) {
            (_, RelayMessage::Welcome { peer_id }) => {
                info!(local = %peer_id, "Joined room");
                *self.local_id.borrow_mut() = Some(peer_id);
                if self.kind == RoomKind::TwoParty {
                    self.create_session(PeerId::anonymous(), false);
                }
            }

            (RoomKind::TwoParty, RelayMessage::ConnectedPeer(_)) => {
                match self.session(&PeerId::anonymous()) {
                    Some(session) => session.set_polite(true),
                    None => warn!("Peer arrived before the relay welcomed us"),
                }
            }

            (RoomKind::TwoParty, RelayMessage::DisconnectedPeer(_)) => {
                info!("Peer left, rebuilding session for the next arrival");
                self.create_session(PeerId::anonymous(), false);
            }

            (RoomKind::TwoParty, RelayMessage::Signal(envelope)) => {
                self.route(&PeerId::anonymous(), envelope);
            }

            (RoomKind::MultiParty, RelayMessage::ConnectedPeers(peers)) => {
                for peer_id in peers {
                    if !self.is_local(&peer_id) {
                        self.create_session(peer_id, true);
                    }
                }
            }

            (RoomKind::MultiParty, RelayMessage::ConnectedPeer(Some(peer_id))) => {
                if !self.is_local(&peer_id) {
                    self.create_session(peer_id, false);
                }
            }

            (RoomKind::MultiParty, RelayMessage::DisconnectedPeer(Some(peer_id))) => {
                self.remove_session(&peer_id);
            }

            (RoomKind::MultiParty, RelayMessage::Signal(envelope)) => {
                if let Some(to) = envelope.recipient() {
                    if !self.is_local(to) {
                        warn!("Dropping signal addressed to {}", to);
                        return;
                    }
                }
                match envelope.sender().cloned() {
                    Some(from) => self.route(&from, envelope),
                    None => warn!("Dropping unaddressed signal in multi-party room"),
                }
            }

            (kind, other) => warn!("Unexpected relay message in {:?} room: {:?}", kind, other),
        }
    }

    pub fn handle_command(&self, cmd: ManagerCommand) {
        match cmd {
            ManagerCommand::Chat(message) => {
                self.broadcast(|| SessionInput::Chat(message.clone()))
            }
            ManagerCommand::File(file) => self.broadcast(|| SessionInput::File(file.clone())),
            ManagerCommand::Leave => {}
        }
    }

    fn broadcast(&self, input: impl Fn() -> SessionInput) {
        let sessions = self.sessions.borrow();
        if sessions.is_empty() {
            warn!("No peers in the room, dropping outbound payload");
            return;
        }

        for (peer_id, handle) in sessions.iter() {
            if !handle.send(input()) {
                debug!(peer = %peer_id, "Session inbox closed");
            }
        }
    }

    fn route(&self, from: &PeerId, envelope: SignalEnvelope) {
        let sessions = self.sessions.borrow();
        let Some(handle) = sessions.get(from) else {
            debug!(peer = %from, "Dropping signal from unknown peer");
            return;
        };
        handle.send(SessionInput::Signal(envelope.into_signal()));
    }

    fn is_local(&self, peer_id: &PeerId) -> bool {
        self.local_id.borrow().as_ref() == Some(peer_id)
    }

    /// Starts a session for `peer_id`, replacing any previous one. Payloads
    /// still pending on the replaced session carry over.
    fn create_session(&self, peer_id: PeerId, polite: bool) {
        let route = match self.kind {
            RoomKind::TwoParty => Route::Broadcast,
            RoomKind::MultiParty => Route::Addressed {
                local: self.local_id().unwrap_or_else(PeerId::anonymous),
                remote: peer_id.clone(),
            },
        };

        info!(peer = %peer_id, polite, "Creating session");
        let handle = PeerSession::spawn(peer_id.clone(), route, polite, self.ctx.clone());

        let previous = self.sessions.borrow_mut().remove(&peer_id);
        if let Some(previous) = previous {
            handle
                .session
                .hub()
                .adopt_pending(previous.session.hub().take_pending());
            tokio::task::spawn_local(previous.shutdown());
        }
        self.sessions.borrow_mut().insert(peer_id, handle);
    }

    fn remove_session(&self, peer_id: &PeerId) {
        let removed = self.sessions.borrow_mut().remove(peer_id);
        match removed {
            Some(handle) => {
                info!(peer = %peer_id, "Peer left");
                tokio::task::spawn_local(handle.shutdown());
            }
            None => debug!(peer = %peer_id, "Departure of unknown peer"),
        }
    }

    pub async fn close_all(&self) {
        let handles: Vec<_> = self.sessions.borrow_mut().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}
