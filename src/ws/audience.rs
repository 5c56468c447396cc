//! Audience message handlers
//!
//! Joining, queueing, speaking, reactions and live transcript lines.

use crate::error::GatewayError;
use crate::state::{deliver, normalize_code, AppState};
use crate::types::{non_empty, TranscriptEntry};
use std::sync::Arc;

use super::{active_binding, Connection, HandlerResult};

/// Speaker label when neither the client nor the floor names one
const DEFAULT_SPEAKER: &str = "Speaker";

pub async fn handle_join_session(
    state: &Arc<AppState>,
    conn: &mut Connection,
    code: &str,
    name: Option<String>,
    profile_ref: Option<String>,
) -> HandlerResult {
    let code = normalize_code(code);
    if let Some(bound) = active_binding(state, conn).await {
        if bound != code {
            return Err(GatewayError::AlreadyInSession(bound));
        }
    }

    let handle = state.session(&code).await?;
    let mut session = handle.lock().await;
    if !session.is_active() {
        return Err(GatewayError::SessionEnded(code));
    }

    match session.join_as_participant(&conn.id, name, profile_ref) {
        Ok(applied) => {
            deliver(state.hub.as_ref(), &session, applied);
            tracing::info!(connection = %conn.id, session = %code, "Participant joined");
            conn.session = Some(code);
        }
        Err(reason) => {
            tracing::debug!(connection = %conn.id, session = %code, %reason, "Join ignored");
        }
    }
    Ok(None)
}

pub async fn handle_join_queue(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    name: Option<String>,
    profile_ref: Option<String>,
) -> HandlerResult {
    state
        .apply(code, |s| s.enqueue(&conn.id, name, profile_ref))
        .await?;
    Ok(None)
}

pub async fn handle_leave_queue(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
) -> HandlerResult {
    state.apply(code, |s| s.leave_queue(&conn.id)).await?;
    Ok(None)
}

pub async fn handle_submit_question(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    text: String,
) -> HandlerResult {
    state
        .apply(code, |s| s.submit_question(&conn.id, text))
        .await?;
    Ok(None)
}

pub async fn handle_rejoin_queue(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    name: Option<String>,
    profile_ref: Option<String>,
) -> HandlerResult {
    state
        .apply(code, |s| s.requeue_as_follow_up(&conn.id, name, profile_ref))
        .await?;
    Ok(None)
}

pub async fn handle_end_speech(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
) -> HandlerResult {
    state.apply(code, |s| s.end_speech(&conn.id)).await?;
    Ok(None)
}

pub async fn handle_signal_follow_up(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
) -> HandlerResult {
    state.apply(code, |s| s.signal_follow_up(&conn.id)).await?;
    Ok(None)
}

pub async fn handle_send_reaction(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    emoji: String,
) -> HandlerResult {
    if emoji.trim().is_empty() {
        return Ok(None);
    }
    state.apply(code, |s| s.react(&conn.id, emoji)).await?;
    Ok(None)
}

/// Filter a transcript line, then append and broadcast it.
///
/// The filter may be slow, so it runs before the session lock is taken.
pub async fn handle_transcript_send(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    text: String,
    speaker: Option<String>,
) -> HandlerResult {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let handle = state.session(code).await?;
    let filtered = state.filter.filter(&text).await;
    if filtered.beeped {
        tracing::info!(session = code, filter = state.filter.name(), "Transcript line masked");
    }

    let mut session = handle.lock().await;
    let speaker = non_empty(speaker)
        .or_else(|| session.floor.as_ref().map(|f| f.display_name.clone()))
        .unwrap_or_else(|| DEFAULT_SPEAKER.to_string());

    // Millisecond ids, bumped past the last entry so they stay unique
    let now = chrono::Utc::now();
    let id = u64::try_from(now.timestamp_millis())
        .unwrap_or_default()
        .max(session.transcript.back().map_or(0, |e| e.id + 1));

    let entry = TranscriptEntry {
        id,
        speaker,
        original_text: filtered.beeped.then_some(text),
        text: filtered.text,
        beeped: filtered.beeped,
        timestamp: now.to_rfc3339(),
    };

    match session.record_transcript(&conn.id, entry) {
        Ok(applied) => deliver(state.hub.as_ref(), &session, applied),
        Err(reason) => {
            tracing::debug!(session = %session.code, %reason, "Transcript line ignored");
        }
    }
    Ok(None)
}
