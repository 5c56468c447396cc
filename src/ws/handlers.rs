//! WebSocket message dispatch
//!
//! This module provides the main entry point for handling client messages.
//! Each message is attributed to the sending connection and the session code
//! it names, then handed to the owner, audience or signaling handlers.
//! Owner-only checks happen inside the session authority, where a
//! non-owner request is silently ignored.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::relay::SignalKind;
use crate::state::AppState;
use std::sync::Arc;

use super::{audience, host, signaling, Connection};

/// Reason broadcast when the owner's connection drops
pub const OWNER_DISCONNECTED: &str = "owner disconnected";

/// Handle client messages and return optional response for the sender
pub async fn handle_message(
    msg: ClientMessage,
    conn: &mut Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let result = match msg {
        // Session lifecycle
        ClientMessage::CreateSession { name, host_name } => {
            host::handle_create_session(state, conn, name, host_name).await
        }

        ClientMessage::JoinSession {
            code,
            name,
            profile_ref,
        } => audience::handle_join_session(state, conn, &code, name, profile_ref).await,

        ClientMessage::EndSession { code } => host::handle_end_session(state, conn, &code).await,

        // Queue and floor
        ClientMessage::JoinQueue {
            code,
            name,
            profile_ref,
        } => audience::handle_join_queue(state, conn, &code, name, profile_ref).await,

        ClientMessage::LeaveQueue { code } => {
            audience::handle_leave_queue(state, conn, &code).await
        }

        ClientMessage::SubmitQuestion { code, text } => {
            audience::handle_submit_question(state, conn, &code, text).await
        }

        ClientMessage::RejoinQueue {
            code,
            name,
            profile_ref,
        } => audience::handle_rejoin_queue(state, conn, &code, name, profile_ref).await,

        ClientMessage::GrantFloor {
            code,
            connection_id,
        } => host::handle_grant_floor(state, conn, &code, &connection_id).await,

        ClientMessage::EndSpeech { code } => audience::handle_end_speech(state, conn, &code).await,

        ClientMessage::RemoveSpeaker { code } => {
            host::handle_remove_speaker(state, conn, &code).await
        }

        ClientMessage::RemoveFromQueue {
            code,
            connection_id,
        } => host::handle_remove_from_queue(state, conn, &code, &connection_id).await,

        ClientMessage::SignalFollowUp { code } => {
            audience::handle_signal_follow_up(state, conn, &code).await
        }

        ClientMessage::FollowUpResponse { code, approved } => {
            host::handle_follow_up_response(state, conn, &code, approved).await
        }

        // Signaling relay
        ClientMessage::SignalingOffer { code, to, payload } => {
            signaling::handle_signal(state, conn, SignalKind::Offer, code, to, payload).await
        }

        ClientMessage::SignalingAnswer { code, to, payload } => {
            signaling::handle_signal(state, conn, SignalKind::Answer, code, to, payload).await
        }

        ClientMessage::SignalingCandidate { code, to, payload } => {
            signaling::handle_signal(state, conn, SignalKind::IceCandidate, code, to, payload)
                .await
        }

        // Audience extras
        ClientMessage::SendReaction { code, emoji } => {
            audience::handle_send_reaction(state, conn, &code, emoji).await
        }

        ClientMessage::TranscriptSend {
            code,
            text,
            speaker,
        } => audience::handle_transcript_send(state, conn, &code, text, speaker).await,
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!(connection = %conn.id, error = %e, "Request failed");
            Some(e.into())
        }
    }
}

/// Clean up after a closed connection.
///
/// The owner leaving ends the session; anyone else is removed from it.
pub async fn handle_disconnect(state: &Arc<AppState>, conn: &Connection) {
    state.hub.unregister(&conn.id);
    if let Some(limiter) = &state.rate_limiter {
        limiter.forget(&conn.id).await;
    }

    let Some(code) = conn.session.as_deref() else {
        return;
    };

    let mut owner_left = false;
    let result = state
        .apply(code, |session| {
            if session.is_owner(&conn.id) {
                owner_left = true;
                session.end_session(&conn.id, Some(OWNER_DISCONNECTED.to_string()))
            } else {
                session.remove_participant(&conn.id)
            }
        })
        .await;

    match result {
        Ok(true) if owner_left => {
            state
                .registry
                .schedule_eviction(code, state.config.grace_period);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(session = code, error = %e, "Nothing to clean up on disconnect");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionStatus;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn create(state: &Arc<AppState>, owner: &mut Connection) -> String {
        match handle_message(
            ClientMessage::CreateSession {
                name: Some("Town Hall".to_string()),
                host_name: Some("Mia".to_string()),
            },
            owner,
            state,
        )
        .await
        {
            Some(ServerMessage::SessionCreated { session }) => session.code,
            other => panic!("Expected SessionCreated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_unknown_session_reports_not_found() {
        let state = Arc::new(AppState::new());
        let mut conn = Connection::with_id("p1");

        let result = handle_message(
            ClientMessage::JoinSession {
                code: "ZZZZ".to_string(),
                name: None,
                profile_ref: None,
            },
            &mut conn,
            &state,
        )
        .await;

        match result {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "SESSION_NOT_FOUND"),
            other => panic!("Expected error, got {:?}", other),
        }
        assert!(conn.session.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_owner_command_is_silent() {
        let state = Arc::new(AppState::new());
        let mut owner = Connection::with_id("owner");
        let mut p1 = Connection::with_id("p1");
        let mut owner_rx = state.hub.register("owner");
        let mut p1_rx = state.hub.register("p1");

        let code = create(&state, &mut owner).await;
        handle_message(
            ClientMessage::JoinSession {
                code: code.clone(),
                name: Some("Ana".to_string()),
                profile_ref: None,
            },
            &mut p1,
            &state,
        )
        .await;
        handle_message(
            ClientMessage::JoinQueue {
                code: code.clone(),
                name: None,
                profile_ref: None,
            },
            &mut p1,
            &state,
        )
        .await;
        drain(&mut owner_rx);
        drain(&mut p1_rx);

        let reply = handle_message(
            ClientMessage::GrantFloor {
                code: code.clone(),
                connection_id: "p1".to_string(),
            },
            &mut p1,
            &state,
        )
        .await;

        assert!(reply.is_none());
        assert!(drain(&mut owner_rx).is_empty());
        assert!(drain(&mut p1_rx).is_empty());

        let handle = state.session(&code).await.unwrap();
        assert!(handle.lock().await.floor.is_none());
    }

    #[tokio::test]
    async fn test_second_create_while_bound_is_rejected() {
        let state = Arc::new(AppState::new());
        let mut owner = Connection::with_id("owner");
        let _rx = state.hub.register("owner");
        create(&state, &mut owner).await;

        let reply = handle_message(
            ClientMessage::CreateSession {
                name: None,
                host_name: None,
            },
            &mut owner,
            &state,
        )
        .await;

        assert!(matches!(
            reply,
            Some(ServerMessage::Error { ref code, .. }) if code == "ALREADY_IN_SESSION"
        ));
        assert_eq!(state.registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_participant_disconnect_cleans_up() {
        let state = Arc::new(AppState::new());
        let mut owner = Connection::with_id("owner");
        let mut p1 = Connection::with_id("p1");
        let mut owner_rx = state.hub.register("owner");
        let _p1_rx = state.hub.register("p1");

        let code = create(&state, &mut owner).await;
        for msg in [
            ClientMessage::JoinSession {
                code: code.clone(),
                name: Some("Ana".to_string()),
                profile_ref: None,
            },
            ClientMessage::JoinQueue {
                code: code.clone(),
                name: None,
                profile_ref: None,
            },
        ] {
            handle_message(msg, &mut p1, &state).await;
        }
        drain(&mut owner_rx);

        handle_disconnect(&state, &p1).await;

        let messages = drain(&mut owner_rx);
        match messages.as_slice() {
            [ServerMessage::SessionState { session }] => {
                assert!(session.queue.is_empty());
                assert_eq!(session.participant_count, 0);
                assert_eq!(session.status, SessionStatus::Active);
            }
            other => panic!("Expected one snapshot, got {:?}", other),
        }
        assert!(!state.hub.is_connected("p1"));
    }

    #[tokio::test]
    async fn test_stale_binding_disconnect_leaves_session_alone() {
        let state = Arc::new(AppState::new());
        let mut owner = Connection::with_id("owner");
        let mut owner_rx = state.hub.register("owner");
        let code = create(&state, &mut owner).await;
        drain(&mut owner_rx);

        // Bound to a code it never joined, as after the old session was
        // evicted and the code handed out again
        let mut stale = Connection::with_id("stale");
        stale.session = Some(code.clone());
        let _stale_rx = state.hub.register("stale");

        handle_disconnect(&state, &stale).await;

        assert!(drain(&mut owner_rx).is_empty());
        let handle = state.session(&code).await.unwrap();
        assert_eq!(handle.lock().await.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_join_second_session_while_bound_is_rejected() {
        let state = Arc::new(AppState::new());
        let mut first_owner = Connection::with_id("owner-1");
        let mut second_owner = Connection::with_id("owner-2");
        let mut p1 = Connection::with_id("p1");
        let _rx = state.hub.register("owner-1");
        let mut second_rx = state.hub.register("owner-2");
        let _p1_rx = state.hub.register("p1");

        let first = create(&state, &mut first_owner).await;
        let second = create(&state, &mut second_owner).await;
        drain(&mut second_rx);

        let join = |code: &str| ClientMessage::JoinSession {
            code: code.to_string(),
            name: Some("Ana".to_string()),
            profile_ref: None,
        };
        assert!(handle_message(join(&first), &mut p1, &state).await.is_none());

        let reply = handle_message(join(&second), &mut p1, &state).await;
        match reply {
            Some(ServerMessage::Error { code, msg }) => {
                assert_eq!(code, "ALREADY_IN_SESSION");
                assert!(msg.contains(&first));
            }
            other => panic!("Expected error, got {:?}", other),
        }
        assert_eq!(p1.session.as_deref(), Some(first.as_str()));
        assert!(drain(&mut second_rx).is_empty());

        // Re-joining the bound session just refreshes the record
        assert!(handle_message(join(&first.to_lowercase()), &mut p1, &state)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_blank_reaction_is_ignored() {
        let state = Arc::new(AppState::new());
        let mut owner = Connection::with_id("owner");
        let mut owner_rx = state.hub.register("owner");
        let code = create(&state, &mut owner).await;

        let reply = handle_message(
            ClientMessage::SendReaction {
                code,
                emoji: "  ".to_string(),
            },
            &mut owner,
            &state,
        )
        .await;

        assert!(reply.is_none());
        assert!(drain(&mut owner_rx).is_empty());
    }

    #[tokio::test]
    async fn test_transcript_speaker_falls_back_to_default_label() {
        let state = Arc::new(AppState::new());
        let mut owner = Connection::with_id("owner");
        let mut owner_rx = state.hub.register("owner");
        let code = create(&state, &mut owner).await;

        handle_message(
            ClientMessage::TranscriptSend {
                code: code.clone(),
                text: "Welcome everyone".to_string(),
                speaker: Some("   ".to_string()),
            },
            &mut owner,
            &state,
        )
        .await;

        match drain(&mut owner_rx).as_slice() {
            [ServerMessage::TranscriptUpdate { entry }] => {
                assert_eq!(entry.speaker, "Speaker");
                assert_eq!(entry.text, "Welcome everyone");
                assert!(entry.original_text.is_none());
            }
            other => panic!("Expected one transcript update, got {:?}", other),
        }

        let handle = state.session(&code).await.unwrap();
        assert_eq!(handle.lock().await.transcript.len(), 1);
    }
}
