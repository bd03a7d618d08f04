use crate::connector::SignalingState;
use parley_core::{IceCandidate, SdpType};
use std::cell::RefCell;

/// Perfect-negotiation flags of one peer pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegotiationState {
    /// Tie-break role, fixed for the lifetime of the pair.
    pub polite: bool,
    pub making_offer: bool,
    pub ignoring_offer: bool,
    pub setting_remote_answer_pending: bool,
    /// Set after a reset on the polite side until it has answered the
    /// remote's fresh offer.
    pub suppressing_initial_offer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Colliding offer on the impolite side: drop it without any state change.
    Ignore,
    Apply,
}

impl NegotiationState {
    pub fn new(polite: bool) -> Self {
        Self {
            polite,
            ..Default::default()
        }
    }

    pub fn ready_for_offer(&self, signaling: SignalingState) -> bool {
        !self.making_offer
            && (signaling == SignalingState::Stable || self.setting_remote_answer_pending)
    }

    pub fn offer_collision(&self, sdp_type: SdpType, signaling: SignalingState) -> bool {
        sdp_type == SdpType::Offer && !self.ready_for_offer(signaling)
    }

    /// Decides the fate of an inbound description and records whether it was
    /// ignored.
    pub fn admit_description(&mut self, sdp_type: SdpType, signaling: SignalingState) -> Admission {
        self.ignoring_offer = !self.polite && self.offer_collision(sdp_type, signaling);

        if self.ignoring_offer {
            Admission::Ignore
        } else {
            Admission::Apply
        }
    }

    /// Failures caused by candidates of an offer we ignored are expected noise.
    pub fn should_report_candidate_failure(&self, candidate: &IceCandidate) -> bool {
        !self.ignoring_offer && !candidate.is_trivial()
    }

    pub fn reset(&mut self) {
        self.making_offer = false;
        self.ignoring_offer = false;
        self.setting_remote_answer_pending = false;
        self.suppressing_initial_offer = self.polite;
    }
}

/// Holds `making_offer` for the duration of local offer construction and
/// clears it when dropped, however the construction ended.
pub struct MakingOffer<'a> {
    state: &'a RefCell<NegotiationState>,
}

impl<'a> MakingOffer<'a> {
    pub fn begin(state: &'a RefCell<NegotiationState>) -> Self {
        state.borrow_mut().making_offer = true;
        Self { state }
    }
}

impl Drop for MakingOffer<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().making_offer = false;
    }
}
