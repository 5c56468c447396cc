pub mod authority;
mod delivery;
pub mod registry;
pub mod relay;
pub mod session;

pub use authority::{Applied, AuthorityResult, Effect};
pub use delivery::{deliver, deliver_route};
pub use registry::{normalize_code, SessionHandle, SessionRegistry};
pub use session::Session;

use crate::abuse::{AbuseConfig, RateLimiter};
use crate::config::ServerConfig;
use crate::error::GatewayError;
use crate::filter::{TranscriptFilter, WordListFilter};
use crate::transport::ConnectionHub;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    /// Outbound channel of every live connection
    pub hub: Arc<ConnectionHub>,
    pub filter: Arc<dyn TranscriptFilter>,
    pub rate_limiter: Option<RateLimiter>,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default(), AbuseConfig { rate_limiter: None })
    }

    pub fn from_config(config: ServerConfig, abuse: AbuseConfig) -> Self {
        let filter = WordListFilter::new(&config.transcript_blocklist);
        Self {
            registry: SessionRegistry::new(),
            hub: Arc::new(ConnectionHub::new()),
            filter: Arc::new(filter),
            rate_limiter: abuse.rate_limiter,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Swap the transcript filter
    pub fn with_filter(mut self, filter: Arc<dyn TranscriptFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Resolve a session code or fail with `SessionNotFound`
    pub async fn session(&self, code: &str) -> Result<SessionHandle, GatewayError> {
        self.registry
            .get(code)
            .await
            .ok_or_else(|| GatewayError::SessionNotFound(normalize_code(code)))
    }

    /// Run one authority operation under the session lock and deliver its
    /// effects before releasing it. Returns whether the operation applied.
    pub async fn apply<F>(&self, code: &str, op: F) -> Result<bool, GatewayError>
    where
        F: FnOnce(&mut Session) -> AuthorityResult,
    {
        let handle = self.session(code).await?;
        let mut session = handle.lock().await;

        match op(&mut *session) {
            Ok(applied) => {
                deliver(self.hub.as_ref(), &session, applied);
                Ok(true)
            }
            Err(reason) => {
                tracing::debug!(session = %session.code, %reason, "Operation ignored");
                Ok(false)
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
