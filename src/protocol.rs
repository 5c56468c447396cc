use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateSession {
        name: Option<String>,
        host_name: Option<String>,
    },
    JoinSession {
        code: SessionCode,
        name: Option<String>,
        profile_ref: Option<String>,
    },
    /// End the session (owner only)
    EndSession {
        code: SessionCode,
    },
    JoinQueue {
        code: SessionCode,
        name: Option<String>,
        profile_ref: Option<String>,
    },
    LeaveQueue {
        code: SessionCode,
    },
    SubmitQuestion {
        code: SessionCode,
        text: String,
    },
    /// Re-queue as a follow-up after a turn on the floor
    RejoinQueue {
        code: SessionCode,
        name: Option<String>,
        profile_ref: Option<String>,
    },
    GrantFloor {
        code: SessionCode,
        connection_id: ConnectionId,
    },
    EndSpeech {
        code: SessionCode,
    },
    RemoveSpeaker {
        code: SessionCode,
    },
    RemoveFromQueue {
        code: SessionCode,
        connection_id: ConnectionId,
    },
    SignalFollowUp {
        code: SessionCode,
    },
    FollowUpResponse {
        code: SessionCode,
        approved: bool,
    },
    SignalingOffer {
        code: Option<SessionCode>,
        to: Option<ConnectionId>,
        #[serde(default)]
        payload: serde_json::Value,
    },
    SignalingAnswer {
        code: Option<SessionCode>,
        to: Option<ConnectionId>,
        #[serde(default)]
        payload: serde_json::Value,
    },
    SignalingCandidate {
        code: Option<SessionCode>,
        to: Option<ConnectionId>,
        #[serde(default)]
        payload: serde_json::Value,
    },
    SendReaction {
        code: SessionCode,
        emoji: String,
    },
    /// Speech-to-text output from the speaker or host
    TranscriptSend {
        code: SessionCode,
        text: String,
        speaker: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        connection_id: ConnectionId,
        server_now: String,
    },
    /// Reply to the owner after `create_session`
    SessionCreated {
        session: SessionSnapshot,
    },
    /// Full state, broadcast after every accepted mutation
    SessionState {
        session: SessionSnapshot,
    },
    FloorGranted,
    SpeechEnded {
        speaker_name: String,
    },
    /// Sent to a speaker whose turn ended gracefully
    MayRequeue,
    RemovedFromSpeaking,
    RemovedFromQueue,
    FollowUpRequested {
        speaker_name: String,
    },
    FollowUpApproved,
    FollowUpDeclined,
    SessionEnded {
        code: SessionCode,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Owner-only notice when someone joins
    ParticipantJoined {
        name: String,
        count: usize,
    },
    SignalingOffer {
        from: ConnectionId,
        payload: serde_json::Value,
    },
    SignalingAnswer {
        from: ConnectionId,
        payload: serde_json::Value,
    },
    SignalingCandidate {
        from: ConnectionId,
        payload: serde_json::Value,
    },
    Reaction {
        emoji: String,
    },
    TranscriptUpdate {
        entry: TranscriptEntry,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Snapshot of a session as seen by every member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub code: SessionCode,
    pub name: String,
    pub owner_name: String,
    pub status: SessionStatus,
    pub queue: Vec<QueueEntryInfo>,
    pub floor: Option<FloorInfo>,
    pub participant_count: usize,
    pub transcript: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntryInfo {
    pub connection_id: ConnectionId,
    pub name: String,
    pub question: String,
    pub profile_ref: String,
    pub follow_up: bool,
}

impl From<&QueueEntry> for QueueEntryInfo {
    fn from(e: &QueueEntry) -> Self {
        Self {
            connection_id: e.connection_id.clone(),
            name: e.display_name.clone(),
            question: e.question.clone().unwrap_or_default(),
            profile_ref: e.profile_ref.clone().unwrap_or_default(),
            follow_up: e.follow_up,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloorInfo {
    pub connection_id: ConnectionId,
    pub name: String,
    pub profile_ref: String,
}

impl From<&QueueEntry> for FloorInfo {
    fn from(e: &QueueEntry) -> Self {
        Self {
            connection_id: e.connection_id.clone(),
            name: e.display_name.clone(),
            profile_ref: e.profile_ref.clone().unwrap_or_default(),
        }
    }
}
