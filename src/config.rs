//! Server configuration loaded from environment variables

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_GRACE_MS: u64 = 3000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// How long an ended session stays resolvable before eviction
    pub grace_period: Duration,
    pub static_dir: String,
    /// Words masked in transcript lines
    pub transcript_blocklist: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            grace_period: Duration::from_millis(DEFAULT_GRACE_MS),
            static_dir: "static".to_string(),
            transcript_blocklist: Vec::new(),
        }
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl ServerConfig {
    /// Load config from environment variables; bad values fall back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_trimmed("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);

        let grace_period = env_trimmed("SESSION_GRACE_MS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.grace_period);

        let static_dir = env_trimmed("STATIC_DIR").unwrap_or(defaults.static_dir);

        let transcript_blocklist = env_trimmed("TRANSCRIPT_BLOCKLIST")
            .map(|v| {
                v.split(',')
                    .map(|w| w.trim().to_string())
                    .filter(|w| !w.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            port,
            grace_period,
            static_dir,
            transcript_blocklist,
        };

        tracing::info!(
            port = config.port,
            grace_ms = config.grace_period.as_millis() as u64,
            static_dir = %config.static_dir,
            blocklist_len = config.transcript_blocklist.len(),
            "Server config loaded"
        );

        config
    }
}
