mod audience;
pub mod handlers;
mod host;
mod signaling;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use std::sync::Arc;

use crate::error::GatewayError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConnectionId, SessionCode};

pub const PROTOCOL_VERSION: &str = "1.0";

/// Optional reply for the sender, or an error reported only to the sender
type HandlerResult = Result<Option<ServerMessage>, GatewayError>;

/// Per-socket context the gateway attributes every message to
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    /// Session this connection created or joined
    pub session: Option<SessionCode>,
}

impl Connection {
    pub fn new() -> Self {
        Self::with_id(ulid::Ulid::new().to_string())
    }

    pub fn with_id(id: impl Into<ConnectionId>) -> Self {
        Self {
            id: id.into(),
            session: None,
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// The session this connection is still bound to, if it is live and active.
/// Ended or evicted sessions no longer hold the connection.
async fn active_binding(state: &AppState, conn: &Connection) -> Option<SessionCode> {
    let code = conn.session.as_deref()?;
    let handle = state.registry.get(code).await?;
    let session = handle.lock().await;
    if session.is_active() {
        Some(session.code.clone())
    } else {
        None
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Rate-limit, parse and dispatch one text frame.
/// Returns the reply for the sender, if any.
pub async fn handle_text(
    text: &str,
    conn: &mut Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    tracing::debug!(connection = %conn.id, "Received message: {}", text);

    if let Some(limiter) = &state.rate_limiter {
        if !limiter.allow(&conn.id).await {
            tracing::warn!(connection = %conn.id, "Rate limited");
            return Some(ServerMessage::Error {
                code: "RATE_LIMITED".to_string(),
                msg: "Too many messages. Please slow down.".to_string(),
            });
        }
    }

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => handlers::handle_message(client_msg, conn, state).await,
        Err(e) => {
            tracing::warn!(connection = %conn.id, "Failed to parse client message: {}", e);
            Some(ServerMessage::Error {
                code: "PARSE_ERROR".to_string(),
                msg: format!("Invalid message format: {}", e),
            })
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut conn = Connection::new();
    let mut outbound = state.hub.register(&conn.id);

    tracing::info!(connection = %conn.id, "WebSocket connected");

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        connection_id: conn.id.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };

    if !send_json(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        handlers::handle_disconnect(&state, &conn).await;
        return;
    }

    loop {
        tokio::select! {
            // Addressed notices, snapshots and relayed signaling
            Some(msg) = outbound.recv() => {
                if !send_json(&mut sender, &msg).await {
                    break;
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(response) = handle_text(&text, &mut conn, &state).await {
                            if !send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    handlers::handle_disconnect(&state, &conn).await;
    tracing::info!(connection = %conn.id, "WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abuse::{AbuseConfig, RateLimiter};
    use crate::config::ServerConfig;
    use std::time::Duration;

    fn limited_state(max_messages: u32) -> Arc<AppState> {
        let abuse = AbuseConfig {
            rate_limiter: Some(RateLimiter::new(max_messages, Duration::from_secs(60))),
        };
        Arc::new(AppState::from_config(ServerConfig::default(), abuse))
    }

    fn error_code(reply: Option<ServerMessage>) -> String {
        match reply {
            Some(ServerMessage::Error { code, .. }) => code,
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_reports_parse_error() {
        let state = Arc::new(AppState::new());
        let mut conn = Connection::with_id("c1");

        let reply = handle_text(r#"{"t":"grant_floor","code":"K3M7"}"#, &mut conn, &state).await;
        assert_eq!(error_code(reply), "PARSE_ERROR");

        let reply = handle_text("not json", &mut conn, &state).await;
        assert_eq!(error_code(reply), "PARSE_ERROR");
    }

    #[tokio::test]
    async fn test_well_formed_frame_is_dispatched() {
        let state = Arc::new(AppState::new());
        let mut conn = Connection::with_id("c1");

        let reply = handle_text(r#"{"t":"create_session","name":"AMA"}"#, &mut conn, &state).await;

        match reply {
            Some(ServerMessage::SessionCreated { session }) => assert_eq!(session.name, "AMA"),
            other => panic!("Expected SessionCreated, got {:?}", other),
        }
        assert!(conn.session.is_some());
    }

    #[tokio::test]
    async fn test_flooding_connection_is_rate_limited() {
        let state = limited_state(2);
        let mut flooder = Connection::with_id("flooder");
        let mut other = Connection::with_id("other");
        let frame = r#"{"t":"leave_queue","code":"ZZZZ"}"#;

        for _ in 0..2 {
            let reply = handle_text(frame, &mut flooder, &state).await;
            assert_eq!(error_code(reply), "SESSION_NOT_FOUND");
        }
        let reply = handle_text(frame, &mut flooder, &state).await;
        assert_eq!(error_code(reply), "RATE_LIMITED");

        // Refused frames are not dispatched, and other connections keep their budget
        let reply = handle_text(r#"{"t":"create_session"}"#, &mut flooder, &state).await;
        assert_eq!(error_code(reply), "RATE_LIMITED");
        assert!(flooder.session.is_none());

        let reply = handle_text(frame, &mut other, &state).await;
        assert_eq!(error_code(reply), "SESSION_NOT_FOUND");
    }
}
