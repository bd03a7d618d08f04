//! [`PeerConnector`] over webrtc-rs.

use crate::config::PeerConfig;
use crate::connector::{
    ChannelOptions, ChannelPayload, ConnectionEvent, ConnectionState, ConnectorFactory,
    DataChannel, EventSink, LocalTrack, PeerConnector, RemoteTrack, SignalingState,
};
use crate::error::{PeerError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parley_core::{IceCandidate, IceServerConfig, SdpType, SessionDescription};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

pub struct RtcConnectorFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl RtcConnectorFactory {
    pub fn new(config: &PeerConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
        }
    }
}

#[async_trait]
impl ConnectorFactory for RtcConnectorFactory {
    async fn create(&self, sink: EventSink) -> Result<Arc<dyn PeerConnector>> {
        let connector = RtcConnector::new(&self.ice_servers, sink).await?;
        Ok(Arc::new(connector))
    }
}

pub struct RtcConnector {
    peer_connection: Arc<RTCPeerConnection>,
    sink: EventSink,
    /// Serializes description and candidate operations in call order.
    operations: Mutex<()>,
}

impl RtcConnector {
    pub async fn new(ice_servers: &[IceServerConfig], sink: EventSink) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        register_callbacks(&peer_connection, &sink);

        debug!(
            peer = %sink.peer_id(),
            generation = sink.generation(),
            "Peer connection created"
        );

        Ok(Self {
            peer_connection,
            sink,
            operations: Mutex::new(()),
        })
    }

    async fn rollback(&self) -> Result<()> {
        let Some(pending) = self.peer_connection.pending_local_description().await else {
            return Ok(());
        };

        let mut rollback = RTCSessionDescription::default();
        rollback.sdp_type = RTCSdpType::Rollback;
        rollback.sdp = pending.sdp;
        self.peer_connection.set_local_description(rollback).await?;
        Ok(())
    }
}

fn register_callbacks(peer_connection: &Arc<RTCPeerConnection>, sink: &EventSink) {
    let negotiation_sink = sink.clone();
    peer_connection.on_negotiation_needed(Box::new(move || {
        let sink = negotiation_sink.clone();
        Box::pin(async move {
            sink.emit(ConnectionEvent::NegotiationNeeded);
        })
    }));

    let ice_sink = sink.clone();
    peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let sink = ice_sink.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else { return };
            let Ok(init) = candidate.to_json() else {
                return;
            };
            sink.emit(ConnectionEvent::IceCandidate(IceCandidate {
                candidate: init.candidate,
                sdp_mid: init.sdp_mid,
                sdp_m_line_index: init.sdp_mline_index,
                username_fragment: init.username_fragment,
            }));
        })
    }));

    let state_sink = sink.clone();
    peer_connection.on_peer_connection_state_change(Box::new(
        move |state: RTCPeerConnectionState| {
            let sink = state_sink.clone();
            Box::pin(async move {
                if state == RTCPeerConnectionState::Unspecified {
                    return;
                }
                info!(peer = %sink.peer_id(), "Connection state changed: {}", state);
                sink.emit(ConnectionEvent::StateChanged(connection_state(state)));
            })
        },
    ));

    let track_sink = sink.clone();
    peer_connection.on_track(Box::new(
        move |track: Arc<TrackRemote>, _: Arc<RTCRtpReceiver>, _: Arc<RTCRtpTransceiver>| {
            let sink = track_sink.clone();
            Box::pin(async move {
                sink.emit(ConnectionEvent::TrackAdded(RemoteTrack {
                    id: track.id(),
                    kind: track.kind().to_string(),
                    stream_id: track.stream_id(),
                }));
            })
        },
    ));

    let channel_sink = sink.clone();
    peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
        let sink = channel_sink.clone();
        Box::pin(async move {
            debug!(peer = %sink.peer_id(), "Remote opened channel '{}'", channel.label());
            wire_channel(&channel, &sink);
            sink.emit(ConnectionEvent::ChannelAnnounced(Arc::new(RtcDataChannel {
                inner: channel,
            })));
        })
    }));
}

fn wire_channel(channel: &Arc<RTCDataChannel>, sink: &EventSink) {
    let label = channel.label().to_owned();

    let open_sink = sink.clone();
    let open_label = label.clone();
    channel.on_open(Box::new(move || {
        Box::pin(async move {
            open_sink.emit(ConnectionEvent::ChannelOpened(open_label));
        })
    }));

    let message_sink = sink.clone();
    let message_label = label.clone();
    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        let payload = if msg.is_string {
            ChannelPayload::Text(String::from_utf8_lossy(&msg.data).into_owned())
        } else {
            ChannelPayload::Binary(msg.data)
        };
        let sink = message_sink.clone();
        let label = message_label.clone();
        Box::pin(async move {
            sink.emit(ConnectionEvent::ChannelMessage { label, payload });
        })
    }));

    let close_sink = sink.clone();
    channel.on_close(Box::new(move || {
        let sink = close_sink.clone();
        let label = label.clone();
        Box::pin(async move {
            sink.emit(ConnectionEvent::ChannelClosed(label));
        })
    }));
}

fn signaling_state(state: RTCSignalingState) -> SignalingState {
    match state {
        RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
        RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
        RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
        RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
        RTCSignalingState::Closed => SignalingState::Closed,
        _ => SignalingState::Stable,
    }
}

fn connection_state(state: RTCPeerConnectionState) -> ConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
        _ => ConnectionState::New,
    }
}

fn to_rtc(description: &SessionDescription) -> Result<RTCSessionDescription> {
    let sdp = description.sdp.clone().unwrap_or_default();

    let rtc = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(sdp)?,
        SdpType::Rollback => {
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            rollback.sdp = sdp;
            rollback
        }
        SdpType::Reset => {
            return Err(PeerError::InvalidState(
                "reset marker cannot be applied".to_string(),
            ));
        }
    };

    Ok(rtc)
}

fn from_rtc(description: RTCSessionDescription) -> Option<SessionDescription> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        _ => return None,
    };

    Some(SessionDescription {
        sdp_type,
        sdp: Some(description.sdp),
    })
}

#[async_trait]
impl PeerConnector for RtcConnector {
    fn signaling_state(&self) -> SignalingState {
        signaling_state(self.peer_connection.signaling_state())
    }

    fn connection_state(&self) -> ConnectionState {
        connection_state(self.peer_connection.connection_state())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.peer_connection
            .local_description()
            .await
            .and_then(from_rtc)
    }

    async fn set_local_description(&self, description: Option<SessionDescription>) -> Result<()> {
        let _op = self.operations.lock().await;

        let description = match description {
            Some(description) => to_rtc(&description)?,
            None => match self.peer_connection.signaling_state() {
                RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveLocalPranswer => {
                    self.peer_connection.create_answer(None).await?
                }
                _ => self.peer_connection.create_offer(None).await?,
            },
        };

        self.peer_connection.set_local_description(description).await?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let _op = self.operations.lock().await;
        let offer = self.peer_connection.create_offer(None).await?;
        from_rtc(offer).ok_or_else(|| PeerError::InvalidState(self.signaling_state().to_string()))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let _op = self.operations.lock().await;
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc(answer).ok_or_else(|| PeerError::InvalidState(self.signaling_state().to_string()))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let _op = self.operations.lock().await;

        if description.sdp_type == SdpType::Offer
            && self.peer_connection.signaling_state() == RTCSignalingState::HaveLocalOffer
        {
            debug!(peer = %self.sink.peer_id(), "Rolling back local offer");
            self.rollback().await?;
        }

        self.peer_connection
            .set_remote_description(to_rtc(&description)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let _op = self.operations.lock().await;

        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: candidate.username_fragment,
            })
            .await?;
        Ok(())
    }

    async fn create_data_channel(
        &self,
        label: &str,
        options: ChannelOptions,
    ) -> Result<Arc<dyn DataChannel>> {
        let init = RTCDataChannelInit {
            ordered: Some(options.ordered),
            negotiated: options.negotiated_id,
            ..Default::default()
        };

        let channel = self
            .peer_connection
            .create_data_channel(label, Some(init))
            .await?;
        wire_channel(&channel, &self.sink);

        Ok(Arc::new(RtcDataChannel { inner: channel }))
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        let sender = self.peer_connection.add_track(track).await?;

        // RTCP has to be drained for interceptors to work.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

struct RtcDataChannel {
    inner: Arc<RTCDataChannel>,
}

#[async_trait]
impl DataChannel for RtcDataChannel {
    fn label(&self) -> &str {
        self.inner.label()
    }

    fn is_open(&self) -> bool {
        self.inner.ready_state() == RTCDataChannelState::Open
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.inner.send_text(text).await?;
        Ok(())
    }

    async fn send_binary(&self, data: Bytes) -> Result<()> {
        self.inner.send(&data).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}
