use serde::{Deserialize, Serialize};

/// Opaque ID types
pub type ConnectionId = String;
pub type SessionCode = String;

/// Fallback display name for participants who did not give one
pub const DEFAULT_GUEST_NAME: &str = "Guest";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Descriptive fields supplied by the owner when creating a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub name: String,
    pub owner_name: String,
}

impl SessionMetadata {
    pub fn new(name: Option<String>, owner_name: Option<String>) -> Self {
        Self {
            name: non_empty(name).unwrap_or_else(|| "Untitled".to_string()),
            owner_name: non_empty(owner_name).unwrap_or_else(|| "Host".to_string()),
        }
    }
}

/// A connection that joined a session as audience
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub profile_ref: Option<String>,
}

/// A participant waiting for (or holding) the floor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub profile_ref: Option<String>,
    pub question: Option<String>,
    /// Re-queued after a finished or declined turn
    pub follow_up: bool,
}

/// One line of the live transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub id: u64,
    pub speaker: String,
    pub text: String,
    /// Unfiltered text, only present when the filter changed something
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    pub beeped: bool,
    pub timestamp: String,
}

/// Trim and drop empty strings
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
