//! HTTP surface: WebSocket upgrade, health probe and the static frontend.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::state::AppState;
use crate::ws;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Sessions currently in the registry, including ended ones awaiting eviction
    pub sessions: usize,
    pub connections: usize,
    pub sessions_created: u64,
    pub uptime_secs: u64,
}

/// Liveness and load summary.
///
/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.registry.len().await,
        connections: state.hub.len(),
        sessions_created: state.registry.total_created(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: &'static str,
}

/// Unknown API paths get a JSON 404 instead of the frontend
pub async fn api_not_found() -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError { error: "Not found" }))
}

/// Routes plus the static frontend. Paths that match no file fall back to
/// `index.html` so client-side routes survive a reload.
pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = Path::new(&state.config.static_dir);
    let frontend =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(health))
        .route("/api/{*path}", any(api_not_found))
        .fallback_service(frontend)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
