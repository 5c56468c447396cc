use crate::protocol::{FloorInfo, QueueEntryInfo, SessionSnapshot};
use crate::types::*;
use std::collections::{HashMap, VecDeque};

/// Transcript lines kept per session
pub const TRANSCRIPT_RETENTION: usize = 100;
/// Transcript lines included in each snapshot
pub const SNAPSHOT_TRANSCRIPT_TAIL: usize = 50;

/// State of one live Q&A session
#[derive(Debug, Clone)]
pub struct Session {
    pub code: SessionCode,
    pub metadata: SessionMetadata,
    pub owner: ConnectionId,
    pub status: SessionStatus,
    pub participants: HashMap<ConnectionId, Participant>,
    pub queue: Vec<QueueEntry>,
    pub floor: Option<QueueEntry>,
    pub transcript: VecDeque<TranscriptEntry>,
}

impl Session {
    pub fn new(code: SessionCode, owner: ConnectionId, metadata: SessionMetadata) -> Self {
        Self {
            code,
            metadata,
            owner,
            status: SessionStatus::Active,
            participants: HashMap::new(),
            queue: Vec::new(),
            floor: None,
            transcript: VecDeque::new(),
        }
    }

    pub fn owner_id(&self) -> &ConnectionId {
        &self.owner
    }

    pub fn floor_occupant_id(&self) -> Option<&ConnectionId> {
        self.floor.as_ref().map(|f| &f.connection_id)
    }

    pub fn is_owner(&self, id: &str) -> bool {
        self.owner == id
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.is_owner(id) || self.participants.contains_key(id)
    }

    /// Owner followed by every participant
    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        std::iter::once(&self.owner).chain(self.participants.keys())
    }

    pub fn queue_position(&self, id: &str) -> Option<usize> {
        self.queue.iter().position(|e| e.connection_id == id)
    }

    /// True if the connection is queued or holds the floor
    pub fn is_queued_or_speaking(&self, id: &str) -> bool {
        self.queue_position(id).is_some() || self.floor_occupant_id().is_some_and(|f| f == id)
    }

    /// Display fields recorded for a connection when it joined
    pub fn identity(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn append_transcript(&mut self, entry: TranscriptEntry) {
        self.transcript.push_back(entry);
        while self.transcript.len() > TRANSCRIPT_RETENTION {
            self.transcript.pop_front();
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let skip = self
            .transcript
            .len()
            .saturating_sub(SNAPSHOT_TRANSCRIPT_TAIL);

        SessionSnapshot {
            code: self.code.clone(),
            name: self.metadata.name.clone(),
            owner_name: self.metadata.owner_name.clone(),
            status: self.status,
            queue: self.queue.iter().map(QueueEntryInfo::from).collect(),
            floor: self.floor.as_ref().map(FloorInfo::from),
            participant_count: self.participants.len(),
            transcript: self.transcript.iter().skip(skip).cloned().collect(),
        }
    }
}
