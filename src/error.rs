//! Error types for the session core.
//!
//! `Rejected` explains why an authority operation was a no-op. It is logged,
//! never sent to clients. `GatewayError` is the only kind of failure that is
//! reported back to the connection that caused it.

use crate::protocol::ServerMessage;
use crate::types::SessionCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("session has ended")]
    SessionEnded,

    #[error("caller is not the session owner")]
    NotOwner,

    #[error("caller already owns the session")]
    IsOwner,

    #[error("caller is not a member of the session")]
    NotMember,

    #[error("caller is already queued or speaking")]
    AlreadyQueued,

    #[error("caller has no queue entry")]
    NotQueued,

    #[error("target is not in the queue")]
    TargetNotQueued,

    #[error("floor is already occupied")]
    FloorOccupied,

    #[error("floor is empty")]
    FloorEmpty,

    #[error("caller is neither the owner nor the speaker")]
    NotOwnerOrSpeaker,

    #[error("caller is not the current speaker")]
    NotSpeaker,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Session {0} not found. Check the code.")]
    SessionNotFound(SessionCode),

    #[error("Session {0} has ended")]
    SessionEnded(SessionCode),

    #[error("Connection is already bound to session {0}")]
    AlreadyInSession(SessionCode),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            GatewayError::SessionEnded(_) => "SESSION_ENDED",
            GatewayError::AlreadyInSession(_) => "ALREADY_IN_SESSION",
        }
    }
}

impl From<GatewayError> for ServerMessage {
    fn from(e: GatewayError) -> Self {
        ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }
    }
}
