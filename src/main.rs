use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use speakapp::{abuse, api, config::ServerConfig, state::AppState};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speakapp=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting speakapp...");

    let config = ServerConfig::from_env();
    let abuse_config = abuse::AbuseConfig::from_env();

    if let Some(limiter) = &abuse_config.rate_limiter {
        abuse::spawn_limiter_cleanup(limiter.clone());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::from_config(config, abuse_config));
    let app = api::router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
