//! Signaling relay
//!
//! Forwards WebRTC negotiation messages between a speaker and the host
//! without looking inside the payload. Routing is best effort: an envelope
//! whose target is gone is dropped, and nothing is buffered or reordered.
//! Candidates can therefore arrive before the offer/answer they belong to;
//! clients queue early candidates themselves.

use super::session::Session;
use crate::protocol::ServerMessage;
use crate::types::ConnectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalingEnvelope {
    pub kind: SignalKind,
    pub sender: ConnectionId,
    pub target: Option<ConnectionId>,
    pub payload: serde_json::Value,
}

/// Where an envelope goes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Direct(ConnectionId),
    /// Every other member of the session
    Flood(Vec<ConnectionId>),
    Unroutable,
}

impl SignalingEnvelope {
    /// Explicitly addressed envelopes are routed without a session
    pub fn needs_session(&self) -> bool {
        self.target.is_none()
    }

    pub fn resolve(&self, session: Option<&Session>) -> Route {
        if let Some(target) = &self.target {
            return Route::Direct(target.clone());
        }

        let Some(session) = session else {
            return Route::Unroutable;
        };

        match self.kind {
            // A speaker's offer always goes to the host
            SignalKind::Offer => Route::Direct(session.owner_id().clone()),
            SignalKind::IceCandidate => Route::Flood(
                session
                    .members()
                    .filter(|id| **id != self.sender)
                    .cloned()
                    .collect(),
            ),
            SignalKind::Answer => Route::Unroutable,
        }
    }

    pub fn into_message(self) -> ServerMessage {
        let from = self.sender;
        let payload = self.payload;
        match self.kind {
            SignalKind::Offer => ServerMessage::SignalingOffer { from, payload },
            SignalKind::Answer => ServerMessage::SignalingAnswer { from, payload },
            SignalKind::IceCandidate => ServerMessage::SignalingCandidate { from, payload },
        }
    }
}
