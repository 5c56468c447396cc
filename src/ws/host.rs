//! Owner command handlers
//!
//! Whether the caller actually owns the session is decided by the session
//! authority; these handlers only resolve the code and report lookup errors.

use crate::error::GatewayError;
use crate::protocol::ServerMessage;
use crate::state::{normalize_code, AppState};
use crate::types::SessionMetadata;
use std::sync::Arc;

use super::{active_binding, Connection, HandlerResult};

pub async fn handle_create_session(
    state: &Arc<AppState>,
    conn: &mut Connection,
    name: Option<String>,
    host_name: Option<String>,
) -> HandlerResult {
    if let Some(bound) = active_binding(state, conn).await {
        return Err(GatewayError::AlreadyInSession(bound));
    }

    let handle = state
        .registry
        .create(conn.id.clone(), SessionMetadata::new(name, host_name))
        .await;
    let session = handle.lock().await;
    conn.session = Some(session.code.clone());

    Ok(Some(ServerMessage::SessionCreated {
        session: session.snapshot(),
    }))
}

pub async fn handle_end_session(
    state: &Arc<AppState>,
    conn: &mut Connection,
    code: &str,
) -> HandlerResult {
    tracing::info!(connection = %conn.id, session = code, "End session requested");
    let ended = state
        .apply(code, |s| s.end_session(&conn.id, None))
        .await?;

    if ended {
        state
            .registry
            .schedule_eviction(code, state.config.grace_period);
        if conn.session.as_deref() == Some(normalize_code(code).as_str()) {
            conn.session = None;
        }
    }
    Ok(None)
}

pub async fn handle_grant_floor(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    target: &str,
) -> HandlerResult {
    tracing::debug!(session = code, target, "Grant floor requested");
    state.apply(code, |s| s.grant_floor(&conn.id, target)).await?;
    Ok(None)
}

pub async fn handle_remove_speaker(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
) -> HandlerResult {
    state.apply(code, |s| s.remove_speaker(&conn.id)).await?;
    Ok(None)
}

pub async fn handle_remove_from_queue(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    target: &str,
) -> HandlerResult {
    tracing::debug!(session = code, target, "Remove from queue requested");
    state
        .apply(code, |s| s.remove_from_queue(&conn.id, target))
        .await?;
    Ok(None)
}

pub async fn handle_follow_up_response(
    state: &Arc<AppState>,
    conn: &Connection,
    code: &str,
    approved: bool,
) -> HandlerResult {
    state
        .apply(code, |s| s.respond_to_follow_up(&conn.id, approved))
        .await?;
    Ok(None)
}
