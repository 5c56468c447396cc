//! Session authority
//!
//! Every operation that changes a session lives here as a synchronous method
//! on `Session`. Each one either applies fully and returns the ordered list of
//! deliveries it causes, or returns the reason it was a no-op. Nothing in this
//! module performs I/O; the gateway turns `Effect`s into outbound messages.

use super::session::Session;
use crate::error::Rejected;
use crate::protocol::ServerMessage;
use crate::types::*;

/// A delivery caused by an accepted operation
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send the post-mutation snapshot to every member
    Snapshot,
    /// Addressed notice for one connection
    Notify {
        to: ConnectionId,
        message: ServerMessage,
    },
    /// Notice for every member of the session
    Announce(ServerMessage),
}

/// Ordered effects of an accepted operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    pub effects: Vec<Effect>,
}

impl Applied {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(mut self) -> Self {
        self.effects.push(Effect::Snapshot);
        self
    }

    pub fn notify(mut self, to: impl Into<ConnectionId>, message: ServerMessage) -> Self {
        self.effects.push(Effect::Notify {
            to: to.into(),
            message,
        });
        self
    }

    pub fn announce(mut self, message: ServerMessage) -> Self {
        self.effects.push(Effect::Announce(message));
        self
    }

    /// True if a snapshot goes out, i.e. the session state changed
    pub fn mutated(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, Effect::Snapshot))
    }
}

pub type AuthorityResult = Result<Applied, Rejected>;

impl Session {
    fn ensure_active(&self) -> Result<(), Rejected> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Rejected::SessionEnded)
        }
    }

    fn ensure_owner(&self, caller: &str) -> Result<(), Rejected> {
        self.ensure_active()?;
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(Rejected::NotOwner)
        }
    }

    fn ensure_member(&self, caller: &str) -> Result<(), Rejected> {
        self.ensure_active()?;
        if self.is_member(caller) {
            Ok(())
        } else {
            Err(Rejected::NotMember)
        }
    }

    /// Build a queue entry, falling back to the display fields given at join
    fn new_entry(
        &self,
        caller: &str,
        name: Option<String>,
        profile_ref: Option<String>,
        follow_up: bool,
    ) -> QueueEntry {
        let identity = self.identity(caller);
        let display_name = non_empty(name)
            .or_else(|| identity.map(|p| p.display_name.clone()))
            .unwrap_or_else(|| DEFAULT_GUEST_NAME.to_string());
        let profile_ref = identity
            .and_then(|p| p.profile_ref.clone())
            .or_else(|| non_empty(profile_ref));

        QueueEntry {
            connection_id: caller.to_string(),
            display_name,
            profile_ref,
            question: None,
            follow_up,
        }
    }

    pub fn join_as_participant(
        &mut self,
        caller: &str,
        name: Option<String>,
        profile_ref: Option<String>,
    ) -> AuthorityResult {
        self.ensure_active()?;
        if self.is_owner(caller) {
            return Err(Rejected::IsOwner);
        }

        let display_name = non_empty(name).unwrap_or_else(|| DEFAULT_GUEST_NAME.to_string());
        let profile_ref = non_empty(profile_ref);

        if let Some(existing) = self.participants.get_mut(caller) {
            existing.display_name = display_name;
            existing.profile_ref = profile_ref;
            return Ok(Applied::new().snapshot());
        }

        self.participants.insert(
            caller.to_string(),
            Participant {
                connection_id: caller.to_string(),
                display_name: display_name.clone(),
                profile_ref,
            },
        );

        let count = self.participants.len();
        Ok(Applied::new().snapshot().notify(
            self.owner.clone(),
            ServerMessage::ParticipantJoined {
                name: display_name,
                count,
            },
        ))
    }

    pub fn enqueue(
        &mut self,
        caller: &str,
        name: Option<String>,
        profile_ref: Option<String>,
    ) -> AuthorityResult {
        self.push_entry(caller, name, profile_ref, false)
    }

    pub fn requeue_as_follow_up(
        &mut self,
        caller: &str,
        name: Option<String>,
        profile_ref: Option<String>,
    ) -> AuthorityResult {
        self.push_entry(caller, name, profile_ref, true)
    }

    fn push_entry(
        &mut self,
        caller: &str,
        name: Option<String>,
        profile_ref: Option<String>,
        follow_up: bool,
    ) -> AuthorityResult {
        self.ensure_member(caller)?;
        if self.is_queued_or_speaking(caller) {
            return Err(Rejected::AlreadyQueued);
        }

        let entry = self.new_entry(caller, name, profile_ref, follow_up);
        self.queue.push(entry);
        Ok(Applied::new().snapshot())
    }

    pub fn leave_queue(&mut self, caller: &str) -> AuthorityResult {
        self.ensure_member(caller)?;
        let idx = self.queue_position(caller).ok_or(Rejected::NotQueued)?;
        self.queue.remove(idx);
        Ok(Applied::new().snapshot())
    }

    pub fn submit_question(&mut self, caller: &str, text: String) -> AuthorityResult {
        self.ensure_member(caller)?;
        let idx = self.queue_position(caller).ok_or(Rejected::NotQueued)?;
        self.queue[idx].question = Some(text);
        Ok(Applied::new().snapshot())
    }

    /// Move any queued entry onto the floor (owner only)
    pub fn grant_floor(&mut self, caller: &str, target: &str) -> AuthorityResult {
        self.ensure_owner(caller)?;
        if self.floor.is_some() {
            return Err(Rejected::FloorOccupied);
        }
        let idx = self.queue_position(target).ok_or(Rejected::TargetNotQueued)?;

        let entry = self.queue.remove(idx);
        tracing::info!(
            session = %self.code,
            speaker = %entry.display_name,
            "Floor granted"
        );
        self.floor = Some(entry);

        Ok(Applied::new()
            .snapshot()
            .notify(target, ServerMessage::FloorGranted))
    }

    /// Graceful end of a turn, by the owner or the speaker
    pub fn end_speech(&mut self, caller: &str) -> AuthorityResult {
        self.ensure_active()?;
        let occupant = self.floor_occupant_id().ok_or(Rejected::FloorEmpty)?;
        if !self.is_owner(caller) && occupant != caller {
            return Err(Rejected::NotOwnerOrSpeaker);
        }

        let Some(speaker) = self.floor.take() else {
            return Err(Rejected::FloorEmpty);
        };

        Ok(Applied::new()
            .snapshot()
            .announce(ServerMessage::SpeechEnded {
                speaker_name: speaker.display_name,
            })
            .notify(speaker.connection_id, ServerMessage::MayRequeue))
    }

    /// Forced eviction from the floor (owner only), no re-queue offer
    pub fn remove_speaker(&mut self, caller: &str) -> AuthorityResult {
        self.ensure_owner(caller)?;
        let speaker = self.floor.take().ok_or(Rejected::FloorEmpty)?;

        Ok(Applied::new()
            .notify(
                speaker.connection_id.clone(),
                ServerMessage::SpeechEnded {
                    speaker_name: speaker.display_name,
                },
            )
            .notify(speaker.connection_id, ServerMessage::RemovedFromSpeaking)
            .snapshot())
    }

    pub fn remove_from_queue(&mut self, caller: &str, target: &str) -> AuthorityResult {
        self.ensure_owner(caller)?;
        let idx = self.queue_position(target).ok_or(Rejected::TargetNotQueued)?;
        self.queue.remove(idx);

        Ok(Applied::new()
            .notify(target, ServerMessage::RemovedFromQueue)
            .snapshot())
    }

    /// Speaker asks the owner for a follow-up; state is unchanged
    pub fn signal_follow_up(&mut self, caller: &str) -> AuthorityResult {
        self.ensure_active()?;
        let speaker = self
            .floor
            .as_ref()
            .filter(|f| f.connection_id == caller)
            .ok_or(Rejected::NotSpeaker)?;

        let speaker_name = speaker.display_name.clone();
        Ok(Applied::new().notify(
            self.owner.clone(),
            ServerMessage::FollowUpRequested { speaker_name },
        ))
    }

    pub fn respond_to_follow_up(&mut self, caller: &str, approved: bool) -> AuthorityResult {
        self.ensure_owner(caller)?;

        if approved {
            let occupant = self.floor_occupant_id().ok_or(Rejected::FloorEmpty)?;
            return Ok(Applied::new().notify(occupant.clone(), ServerMessage::FollowUpApproved));
        }

        let mut speaker = self.floor.take().ok_or(Rejected::FloorEmpty)?;
        let to = speaker.connection_id.clone();
        speaker.question = None;
        speaker.follow_up = true;
        self.queue.push(speaker);

        Ok(Applied::new()
            .notify(to, ServerMessage::FollowUpDeclined)
            .snapshot())
    }

    /// Disconnect cleanup for a non-owner connection.
    /// Strangers are rejected so a stale binding never touches this session.
    pub fn remove_participant(&mut self, id: &str) -> AuthorityResult {
        self.ensure_active()?;
        if self.participants.remove(id).is_none() {
            return Err(Rejected::NotMember);
        }
        self.queue.retain(|e| e.connection_id != id);
        if self.floor_occupant_id().is_some_and(|f| f == id) {
            self.floor = None;
        }
        Ok(Applied::new().snapshot())
    }

    /// Terminal transition; `reason` is set when triggered by a disconnect
    pub fn end_session(&mut self, caller: &str, reason: Option<String>) -> AuthorityResult {
        self.ensure_owner(caller)?;
        self.status = SessionStatus::Ended;
        tracing::info!(session = %self.code, ?reason, "Session ended");

        Ok(Applied::new().announce(ServerMessage::SessionEnded {
            code: self.code.clone(),
            reason,
        }))
    }

    /// Emoji reaction, fanned out to everyone; state is unchanged
    pub fn react(&mut self, caller: &str, emoji: String) -> AuthorityResult {
        self.ensure_member(caller)?;
        Ok(Applied::new().announce(ServerMessage::Reaction { emoji }))
    }

    /// Append a transcript line; the text was already filtered
    pub fn record_transcript(&mut self, caller: &str, entry: TranscriptEntry) -> AuthorityResult {
        self.ensure_member(caller)?;
        self.append_transcript(entry.clone());
        Ok(Applied::new().announce(ServerMessage::TranscriptUpdate { entry }))
    }
}
