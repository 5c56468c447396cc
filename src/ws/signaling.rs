//! Signaling relay handler
//!
//! Offers, answers and candidates are forwarded opaquely. An explicit `to`
//! wins; otherwise the session decides where the envelope goes.

use crate::state::relay::{SignalKind, SignalingEnvelope};
use crate::state::{deliver_route, AppState};
use crate::types::{non_empty, ConnectionId, SessionCode};
use std::sync::Arc;

use super::{Connection, HandlerResult};

pub async fn handle_signal(
    state: &Arc<AppState>,
    conn: &Connection,
    kind: SignalKind,
    code: Option<SessionCode>,
    to: Option<ConnectionId>,
    payload: serde_json::Value,
) -> HandlerResult {
    let envelope = SignalingEnvelope {
        kind,
        sender: conn.id.clone(),
        target: non_empty(to),
        payload,
    };

    if !envelope.needs_session() {
        let route = envelope.resolve(None);
        deliver_route(state.hub.as_ref(), route, envelope.into_message());
        return Ok(None);
    }

    let Some(code) = non_empty(code) else {
        tracing::debug!(connection = %conn.id, ?kind, "Signal without target or session, dropped");
        return Ok(None);
    };

    let handle = state.session(&code).await?;
    let session = handle.lock().await;
    let route = envelope.resolve(Some(&*session));
    tracing::debug!(session = %session.code, ?kind, ?route, "Relaying signal");
    deliver_route(state.hub.as_ref(), route, envelope.into_message());
    Ok(None)
}
