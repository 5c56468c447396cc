//! Anti-abuse protection for the WebSocket endpoint
//!
//! Live events attract floods of reconnects and spammed reactions. Each
//! connection gets a fixed-window budget of inbound messages; anything over
//! it is answered with `RATE_LIMITED` and dropped. A connection's budget
//! lives from its first message until it disconnects.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::types::ConnectionId;

pub const DEFAULT_MAX_MESSAGES: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Floor for the pruning interval so a tiny window cannot spin the task
const MIN_PRUNE_INTERVAL: Duration = Duration::from_secs(1);

/// Messages seen from one connection in the current window
#[derive(Debug, Clone, Copy)]
struct Budget {
    opened: Instant,
    used: u32,
}

impl Budget {
    fn fresh(now: Instant) -> Self {
        Self {
            opened: now,
            used: 1,
        }
    }

    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.opened) >= window
    }
}

/// Per-connection message budget
#[derive(Debug, Clone)]
pub struct RateLimiter {
    budgets: Arc<RwLock<HashMap<ConnectionId, Budget>>>,
    max_messages: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_messages: u32, window: Duration) -> Self {
        Self {
            budgets: Arc::new(RwLock::new(HashMap::new())),
            max_messages,
            window,
        }
    }

    pub fn max_messages(&self) -> u32 {
        self.max_messages
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Spend one message from the connection's budget.
    /// Returns false once the budget for the current window is used up.
    pub async fn allow(&self, connection: &str) -> bool {
        let now = Instant::now();
        let mut budgets = self.budgets.write().await;

        let Some(budget) = budgets.get_mut(connection) else {
            budgets.insert(connection.to_string(), Budget::fresh(now));
            return true;
        };

        if budget.is_stale(now, self.window) {
            *budget = Budget::fresh(now);
            true
        } else if budget.used < self.max_messages {
            budget.used += 1;
            true
        } else {
            false
        }
    }

    /// Drop the budget of a closed connection
    pub async fn forget(&self, connection: &str) {
        self.budgets.write().await.remove(connection);
    }

    /// Remove budgets idle for two windows; returns how many were dropped
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        let idle_after = self.window * 2;
        let mut budgets = self.budgets.write().await;
        let before = budgets.len();
        budgets.retain(|_, budget| !budget.is_stale(now, idle_after));
        before - budgets.len()
    }

    /// Connections that currently hold a budget
    pub async fn tracked(&self) -> usize {
        self.budgets.read().await.len()
    }

    fn prune_interval(&self) -> Duration {
        (self.window * 2).max(MIN_PRUNE_INTERVAL)
    }
}

/// Spawn a background task that prunes budgets left behind by idle connections
pub fn spawn_limiter_cleanup(limiter: RateLimiter) {
    let every = limiter.prune_interval();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            let dropped = limiter.prune().await;
            if dropped > 0 {
                tracing::debug!(dropped, "Pruned idle rate limit budgets");
            }
        }
    });
}

/// Parse a strictly positive number; zero, negatives and garbage are `None`
fn env_positive<T>(key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|v| *v > T::default())
}

/// Anti-abuse configuration
#[derive(Debug, Clone)]
pub struct AbuseConfig {
    /// Rate limiter (None = disabled)
    pub rate_limiter: Option<RateLimiter>,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            rate_limiter: Some(RateLimiter::default()),
        }
    }
}

impl AbuseConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let enabled = std::env::var("ABUSE_RATE_LIMIT")
            .map(|v| {
                let v = v.trim().to_lowercase();
                v != "0" && v != "false"
            })
            .unwrap_or(true);

        if !enabled {
            tracing::info!("Rate limiting disabled");
            return Self { rate_limiter: None };
        }

        let max_messages = env_positive("ABUSE_RATE_LIMIT_MAX").unwrap_or(DEFAULT_MAX_MESSAGES);
        let window = env_positive("ABUSE_RATE_LIMIT_WINDOW")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_WINDOW);

        tracing::info!(
            max_messages,
            window_secs = window.as_secs(),
            "Rate limiting enabled"
        );

        Self {
            rate_limiter: Some(RateLimiter::new(max_messages, window)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "ABUSE_RATE_LIMIT",
        "ABUSE_RATE_LIMIT_MAX",
        "ABUSE_RATE_LIMIT_WINDOW",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[tokio::test]
    async fn test_budget_is_spent_then_refused() {
        let limiter = RateLimiter::new(3, Duration::from_secs(5));
        let conn = ulid::Ulid::new().to_string();

        let mut allowed = Vec::new();
        for _ in 0..4 {
            allowed.push(limiter.allow(&conn).await);
        }
        assert_eq!(allowed, vec![true, true, true, false]);
    }

    #[tokio::test]
    async fn test_noisy_connection_does_not_starve_others() {
        let limiter = RateLimiter::new(1, Duration::from_secs(5));

        assert!(limiter.allow("spammer").await);
        assert!(!limiter.allow("spammer").await);
        assert!(limiter.allow("listener").await);
    }

    #[tokio::test]
    async fn test_budget_refills_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(40));

        assert!(limiter.allow("conn").await);
        assert!(!limiter.allow("conn").await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.allow("conn").await);
    }

    #[tokio::test]
    async fn test_reconnect_after_forget_gets_fresh_budget() {
        let limiter = RateLimiter::new(1, Duration::from_secs(5));

        assert!(limiter.allow("conn").await);
        assert!(!limiter.allow("conn").await);

        limiter.forget("conn").await;
        assert_eq!(limiter.tracked().await, 0);
        assert!(limiter.allow("conn").await);
    }

    #[tokio::test]
    async fn test_prune_drops_only_idle_budgets() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        limiter.allow("idle").await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        limiter.allow("active").await;

        assert_eq!(limiter.prune().await, 1);
        assert_eq!(limiter.tracked().await, 1);
    }

    #[test]
    fn test_prune_interval_has_a_floor() {
        let limiter = RateLimiter::new(5, Duration::from_millis(1));
        assert_eq!(limiter.prune_interval(), MIN_PRUNE_INTERVAL);
        assert_eq!(
            RateLimiter::default().prune_interval(),
            DEFAULT_WINDOW * 2
        );
    }

    #[test]
    #[serial]
    fn test_rate_limit_can_be_disabled() {
        clear_env();
        std::env::set_var("ABUSE_RATE_LIMIT", "False");
        let config = AbuseConfig::from_env();
        clear_env();

        assert!(config.rate_limiter.is_none());
        assert!(AbuseConfig::default().rate_limiter.is_some());
    }

    #[test]
    #[serial]
    fn test_env_overrides_budget() {
        clear_env();
        std::env::set_var("ABUSE_RATE_LIMIT_MAX", "20");
        std::env::set_var("ABUSE_RATE_LIMIT_WINDOW", "3");
        let config = AbuseConfig::from_env();
        clear_env();

        let limiter = config.rate_limiter.unwrap();
        assert_eq!(limiter.max_messages(), 20);
        assert_eq!(limiter.window(), Duration::from_secs(3));
    }

    #[test]
    #[serial]
    fn test_zero_budget_falls_back_to_defaults() {
        clear_env();
        std::env::set_var("ABUSE_RATE_LIMIT_MAX", "0");
        std::env::set_var("ABUSE_RATE_LIMIT_WINDOW", "0");
        let config = AbuseConfig::from_env();
        clear_env();

        let limiter = config.rate_limiter.unwrap();
        assert_eq!(limiter.max_messages(), DEFAULT_MAX_MESSAGES);
        assert_eq!(limiter.window(), DEFAULT_WINDOW);
    }

    #[test]
    #[serial]
    fn test_negative_and_garbage_budget_fall_back() {
        clear_env();
        std::env::set_var("ABUSE_RATE_LIMIT_MAX", "-1");
        std::env::set_var("ABUSE_RATE_LIMIT_WINDOW", "soon");
        let config = AbuseConfig::from_env();
        clear_env();

        let limiter = config.rate_limiter.unwrap();
        assert_eq!(limiter.max_messages(), DEFAULT_MAX_MESSAGES);
        assert_eq!(limiter.window(), DEFAULT_WINDOW);
    }
}
