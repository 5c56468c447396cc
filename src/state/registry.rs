use super::session::Session;
use crate::types::*;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Safe character set for session codes (excludes 0/O, 1/I to avoid confusion)
pub const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 4;

/// A session behind its own lock; holding it serializes that session's mutations
pub type SessionHandle = Arc<Mutex<Session>>;

/// Generate a random session code (4 characters)
fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Normalize user-supplied codes for lookup
pub fn normalize_code(code: &str) -> SessionCode {
    code.trim().to_ascii_uppercase()
}

/// Live sessions keyed by code
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionCode, SessionHandle>>>,
    created: Arc<AtomicU64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh code owned by `owner`
    pub async fn create(&self, owner: ConnectionId, metadata: SessionMetadata) -> SessionHandle {
        let mut sessions = self.sessions.write().await;

        // Collisions only matter against live entries; retry until free
        let code = loop {
            let code = generate_code();
            if !sessions.contains_key(&code) {
                break code;
            }
        };

        tracing::info!(session = %code, name = %metadata.name, "Session created");
        let handle = Arc::new(Mutex::new(Session::new(code.clone(), owner, metadata)));
        sessions.insert(code, handle.clone());
        self.created.fetch_add(1, Ordering::Relaxed);
        handle
    }

    /// Case-insensitive lookup
    pub async fn get(&self, code: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&normalize_code(code))
            .cloned()
    }

    /// Remove the entry once `delay` has elapsed. Not cancellable.
    pub fn schedule_eviction(&self, code: &str, delay: Duration) {
        let sessions = self.sessions.clone();
        let code = normalize_code(code);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sessions.write().await.remove(&code).is_some() {
                tracing::info!(session = %code, "Session evicted");
            }
        });
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sessions created since startup
    pub fn total_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}
