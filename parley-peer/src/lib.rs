pub mod channel;
pub mod config;
pub mod connector;
pub mod error;
pub mod manager;
pub mod negotiation;
pub mod observer;
pub mod relay;
pub mod rtc;
pub mod session;

pub use config::PeerConfig;
pub use connector::*;
pub use error::PeerError;
pub use manager::{ManagerCommand, ManagerHandle, SessionManager};
pub use negotiation::{Admission, MakingOffer, NegotiationState};
pub use observer::{NoopObserver, SessionObserver};
pub use relay::{RelayClient, RelaySink, SignalingOutput};
pub use rtc::RtcConnectorFactory;
pub use session::{PeerSession, Route, SessionContext, SessionHandle, SessionInput};
