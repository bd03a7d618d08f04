//! One perfect-negotiation state machine bound to one remote peer, together
//! with its reset controller.

use crate::channel::{ChannelHub, Inbound, OutgoingFile, Outbound};
use crate::config::PeerConfig;
use crate::connector::{
    ChannelOptions, ConnectionEvent, ConnectorFactory, EventSink, LocalTrack, PeerConnector,
    PeerEvent,
};
use crate::error::Result;
use crate::negotiation::{Admission, MakingOffer, NegotiationState};
use crate::observer::SessionObserver;
use crate::relay::SignalingOutput;
use parley_core::utils::{CHAT_CHANNEL_ID, CHAT_CHANNEL_LABEL};
use parley_core::{
    ChatMessage, IceCandidate, PeerId, SdpType, SessionDescription, Signal, SignalEnvelope,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How outbound signals of a session are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Two-party rooms: the relay forwards to the only other member.
    Broadcast,
    Addressed { local: PeerId, remote: PeerId },
}

impl Route {
    pub fn envelope(&self, signal: Signal) -> SignalEnvelope {
        match self {
            Self::Broadcast => SignalEnvelope::Broadcast(signal),
            Self::Addressed { local, remote } => SignalEnvelope::Addressed {
                to: remote.clone(),
                from: local.clone(),
                signal,
            },
        }
    }
}

#[derive(Debug)]
pub enum SessionInput {
    Signal(Signal),
    Chat(ChatMessage),
    File(OutgoingFile),
    Reset,
}

/// Collaborators shared by every session of a manager.
#[derive(Clone)]
pub struct SessionContext {
    pub factory: Arc<dyn ConnectorFactory>,
    pub signaling: Arc<dyn SignalingOutput>,
    pub observer: Rc<dyn SessionObserver>,
    pub config: Rc<PeerConfig>,
    pub tracks: Vec<LocalTrack>,
}

pub struct PeerSession {
    peer_id: PeerId,
    route: Route,
    state: RefCell<NegotiationState>,
    connector: RefCell<Option<Arc<dyn PeerConnector>>>,
    generation: Cell<u64>,
    /// Held exclusively while the connector is being replaced.
    rebuild_gate: RwLock<()>,
    hub: ChannelHub,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    closed: Cell<bool>,
    ctx: SessionContext,
}

/// A running session: its inbox and the local task draining it.
pub struct SessionHandle {
    pub session: Rc<PeerSession>,
    inbox: mpsc::UnboundedSender<SessionInput>,
    driver: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, input: SessionInput) -> bool {
        self.inbox.send(input).is_ok()
    }

    /// An inbox reference that does not keep the session alive.
    pub fn inbox(&self) -> mpsc::WeakUnboundedSender<SessionInput> {
        self.inbox.downgrade()
    }

    /// Stops accepting input and waits for the session to close its connector.
    pub async fn shutdown(self) {
        drop(self.inbox);
        let _ = self.driver.await;
    }
}

impl PeerSession {
    pub fn new(
        peer_id: PeerId,
        route: Route,
        polite: bool,
        ctx: SessionContext,
    ) -> (Rc<Self>, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let hub = ChannelHub::new(peer_id.clone(), &ctx.config);

        let session = Rc::new(Self {
            peer_id,
            route,
            state: RefCell::new(NegotiationState::new(polite)),
            connector: RefCell::new(None),
            generation: Cell::new(0),
            rebuild_gate: RwLock::new(()),
            hub,
            events_tx,
            closed: Cell::new(false),
            ctx,
        });

        (session, events_rx)
    }

    /// Creates a session and starts its driver on the current `LocalSet`.
    pub fn spawn(
        peer_id: PeerId,
        route: Route,
        polite: bool,
        ctx: SessionContext,
    ) -> SessionHandle {
        let (session, events_rx) = Self::new(peer_id, route, polite, ctx);
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let driver = tokio::task::spawn_local(session.clone().drive(inbox_rx, events_rx));

        SessionHandle {
            session,
            inbox,
            driver,
        }
    }

    /// Builds the first connector, then dispatches every input and connection
    /// event as its own local task, in arrival order.
    async fn drive(
        self: Rc<Self>,
        mut inbox: mpsc::UnboundedReceiver<SessionInput>,
        mut events: mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        self.ctx
            .observer
            .on_session_created(&self.peer_id, self.is_polite())
            .await;

        if let Err(e) = self.establish().await {
            error!(peer = %self.peer_id, "Failed to build connection: {}", e);
        }

        loop {
            tokio::select! {
                input = inbox.recv() => match input {
                    Some(input) => {
                        tokio::task::spawn_local(self.clone().handle_input(input));
                    }
                    None => break,
                },
                Some(event) = events.recv() => {
                    tokio::task::spawn_local(self.clone().handle_event(event));
                }
            }
        }

        self.close().await;
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn is_polite(&self) -> bool {
        self.state.borrow().polite
    }

    /// Assigns the tie-break role when the pair is established.
    pub fn set_polite(&self, polite: bool) {
        self.state.borrow_mut().polite = polite;
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn connector(&self) -> Option<Arc<dyn PeerConnector>> {
        self.connector.borrow().clone()
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Current connector, waiting out a rebuild in progress.
    async fn live_connector(&self) -> Option<Arc<dyn PeerConnector>> {
        let _gate = self.rebuild_gate.read().await;
        self.connector()
    }

    pub async fn establish(&self) -> Result<()> {
        self.rebuild().await
    }

    /// Replaces the connector with a fresh one carrying the same tracks and
    /// chat channel. Events of the discarded instance are ignored from now on.
    async fn rebuild(&self) -> Result<()> {
        let _gate = self.rebuild_gate.write().await;

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.hub.detach();

        let previous = self.connector.borrow_mut().take();
        if let Some(previous) = previous {
            if let Err(e) = previous.close().await {
                debug!(peer = %self.peer_id, "Closing discarded connection failed: {}", e);
            }
        }

        if self.closed.get() {
            return Ok(());
        }

        let sink = EventSink::new(self.peer_id.clone(), generation, self.events_tx.clone());
        let connector = self.ctx.factory.create(sink).await?;
        *self.connector.borrow_mut() = Some(connector.clone());

        for track in &self.ctx.tracks {
            connector.add_track(track.clone()).await?;
        }

        let chat = connector
            .create_data_channel(CHAT_CHANNEL_LABEL, ChannelOptions::negotiated(CHAT_CHANNEL_ID))
            .await?;
        self.hub.attach_chat(chat);

        debug!(peer = %self.peer_id, generation, "Connection built");
        Ok(())
    }

    async fn handle_input(self: Rc<Self>, input: SessionInput) {
        if self.closed.get() {
            return;
        }

        match input {
            SessionInput::Signal(Signal::Description(description)) => {
                self.handle_description(description).await
            }
            SessionInput::Signal(Signal::Candidate(candidate)) => {
                self.handle_candidate(candidate).await
            }
            SessionInput::Chat(message) => {
                let connector = self.connector();
                self.hub.send(connector.as_ref(), Outbound::Chat(message)).await
            }
            SessionInput::File(file) => {
                let connector = self.connector();
                self.hub.send(connector.as_ref(), Outbound::File(file)).await
            }
            SessionInput::Reset => self.reset().await,
        }
    }

    async fn handle_event(self: Rc<Self>, event: PeerEvent) {
        if self.closed.get() {
            return;
        }
        if event.generation != self.generation.get() {
            debug!(
                peer = %self.peer_id,
                "Dropping {:?} from discarded connection {}",
                event.event,
                event.generation
            );
            return;
        }

        self.handle_connection_event(event.event).await;
    }

    pub async fn handle_connection_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::NegotiationNeeded => self.handle_negotiation_needed().await,

            ConnectionEvent::IceCandidate(candidate) => {
                self.send_signal(Signal::Candidate(candidate)).await
            }

            ConnectionEvent::StateChanged(state) => {
                info!(peer = %self.peer_id, "Connection state: {:?}", state);
                self.ctx
                    .observer
                    .on_connection_state(&self.peer_id, state)
                    .await;
            }

            ConnectionEvent::TrackAdded(track) => {
                debug!(peer = %self.peer_id, "Remote {} track {}", track.kind, track.id);
                self.ctx.observer.on_track(&self.peer_id, track).await;
            }

            ConnectionEvent::ChannelAnnounced(channel) => self.hub.on_channel_announced(channel),

            ConnectionEvent::ChannelOpened(label) => {
                let connector = self.connector();
                self.hub.on_channel_open(&label, connector.as_ref()).await;
            }

            ConnectionEvent::ChannelMessage { label, payload } => {
                let connector = self.connector();
                match self
                    .hub
                    .on_channel_message(&label, payload, connector.as_ref())
                    .await
                {
                    Ok(Some(inbound)) => self.report(inbound).await,
                    Ok(None) => {}
                    Err(e) => warn!(peer = %self.peer_id, "Bad frame on '{}': {}", label, e),
                }
            }

            ConnectionEvent::ChannelClosed(label) => {
                debug!(peer = %self.peer_id, "Channel '{}' closed", label);
                self.hub.on_channel_closed(&label);
            }
        }
    }

    async fn report(&self, inbound: Inbound) {
        let observer = &self.ctx.observer;
        match inbound {
            Inbound::Message(message) => observer.on_message(&self.peer_id, message).await,
            Inbound::Receipt(receipt) => {
                observer
                    .on_receipt(&self.peer_id, receipt, receipt.is_delayed())
                    .await
            }
            Inbound::File(file) => observer.on_file(&self.peer_id, file).await,
        }
    }

    pub async fn handle_negotiation_needed(&self) {
        if self.state.borrow().suppressing_initial_offer {
            debug!(peer = %self.peer_id, "Waiting for the remote offer after reset");
            return;
        }
        let Some(connector) = self.live_connector().await else {
            return;
        };
        let generation = self.generation.get();

        let making_offer = MakingOffer::begin(&self.state);
        if let Err(e) = negotiate_local(connector.as_ref(), SdpType::Offer).await {
            warn!(peer = %self.peer_id, "Failed to produce local offer: {}", e);
        }
        self.send_local_description(connector.as_ref(), generation)
            .await;
        drop(making_offer);
    }

    pub async fn handle_description(&self, description: SessionDescription) {
        if description.is_reset_marker() {
            info!(peer = %self.peer_id, "Remote asked for a reset");
            self.reset().await;
            return;
        }

        let Some(connector) = self.live_connector().await else {
            warn!(peer = %self.peer_id, "Dropping description, no live connection");
            return;
        };
        let generation = self.generation.get();
        let sdp_type = description.sdp_type;

        let admission = self
            .state
            .borrow_mut()
            .admit_description(sdp_type, connector.signaling_state());
        if admission == Admission::Ignore {
            debug!(peer = %self.peer_id, "Ignoring colliding offer");
            return;
        }

        self.state.borrow_mut().setting_remote_answer_pending = sdp_type == SdpType::Answer;
        if let Err(e) = connector.set_remote_description(description).await {
            if generation != self.generation.get() {
                debug!(
                    peer = %self.peer_id,
                    "Remote {:?} failed on a discarded connection: {}",
                    sdp_type,
                    e
                );
                return;
            }
            warn!(peer = %self.peer_id, "Failed to apply remote {:?}: {}", sdp_type, e);
            self.reset().await;
            return;
        }
        self.state.borrow_mut().setting_remote_answer_pending = false;

        if sdp_type == SdpType::Offer {
            if let Err(e) = negotiate_local(connector.as_ref(), SdpType::Answer).await {
                warn!(peer = %self.peer_id, "Failed to produce local answer: {}", e);
            }
            if self
                .send_local_description(connector.as_ref(), generation)
                .await
            {
                self.state.borrow_mut().suppressing_initial_offer = false;
            }
        }
    }

    pub async fn handle_candidate(&self, candidate: IceCandidate) {
        let Some(connector) = self.live_connector().await else {
            return;
        };

        if let Err(e) = connector.add_ice_candidate(candidate.clone()).await {
            if self.state.borrow().should_report_candidate_failure(&candidate) {
                error!(peer = %self.peer_id, "Failed to add ICE candidate: {}", e);
            } else {
                debug!(peer = %self.peer_id, "Candidate failure ignored: {}", e);
            }
        }
    }

    /// Rebuilds the connection from scratch. The polite side also asks the
    /// remote to do the same; the impolite side only ever reacts.
    pub async fn reset(&self) {
        let polite = {
            let mut state = self.state.borrow_mut();
            state.reset();
            state.polite
        };
        info!(peer = %self.peer_id, polite, "Resetting connection");

        if let Err(e) = self.rebuild().await {
            error!(peer = %self.peer_id, "Failed to rebuild connection: {}", e);
        }

        if polite {
            self.send_signal(Signal::Description(SessionDescription::reset_marker()))
                .await;
        }

        self.ctx.observer.on_reset(&self.peer_id).await;
    }

    pub async fn close(&self) {
        if self.closed.replace(true) {
            return;
        }

        self.hub.detach();
        let connector = self.connector.borrow_mut().take();
        if let Some(connector) = connector {
            let _ = connector.close().await;
        }

        info!(peer = %self.peer_id, "Session closed");
        self.ctx.observer.on_session_closed(&self.peer_id).await;
    }

    /// Sends the connector's current local description unless a rebuild has
    /// superseded the negotiation that produced it.
    async fn send_local_description(
        &self,
        connector: &dyn PeerConnector,
        generation: u64,
    ) -> bool {
        if generation != self.generation.get() {
            debug!(peer = %self.peer_id, "Negotiation superseded by a reset");
            return false;
        }

        match connector.local_description().await {
            Some(description) => {
                self.send_signal(Signal::Description(description)).await;
                true
            }
            None => {
                warn!(peer = %self.peer_id, "No local description to send");
                false
            }
        }
    }

    async fn send_signal(&self, signal: Signal) {
        if self.closed.get() {
            return;
        }

        let envelope = self.route.envelope(signal);
        if let Err(e) = self.ctx.signaling.send_signal(envelope).await {
            warn!(peer = %self.peer_id, "Failed to send signal: {}", e);
        }
    }
}

/// Sets a local description of `kind`: the connector's implicit path first,
/// an explicit create-then-set if that fails.
pub async fn negotiate_local(connector: &dyn PeerConnector, kind: SdpType) -> Result<()> {
    let Err(implicit) = connector.set_local_description(None).await else {
        return Ok(());
    };
    debug!("Implicit local description failed ({}), creating explicitly", implicit);

    let description = match kind {
        SdpType::Answer => connector.create_answer().await?,
        _ => connector.create_offer().await?,
    };
    connector.set_local_description(Some(description)).await
}
