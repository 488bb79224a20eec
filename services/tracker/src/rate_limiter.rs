//! Login throttling to slow down password guessing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::validation::validate_username;

/// Login throttle configuration
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Failed attempts allowed inside one window
    pub max_attempts: u32,
    pub window: Duration,
    pub ban: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(300),
            ban: Duration::from_secs(900),
        }
    }
}

#[derive(Debug)]
struct Attempts {
    failures: u32,
    window_start: Instant,
    banned_until: Option<Instant>,
}

impl Attempts {
    /// Nothing left to remember: no active ban and the window has passed
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.banned_until {
            Some(banned_until) => now >= banned_until,
            None => now.duration_since(self.window_start) >= window,
        }
    }
}

/// Per-username failed login counter
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    config: ThrottleConfig,
    entries: Arc<Mutex<HashMap<String, Attempts>>>,
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether a login for `username` may be attempted right now
    pub async fn is_allowed(&self, username: &str) -> bool {
        self.is_allowed_at(username, Instant::now()).await
    }

    async fn is_allowed_at(&self, username: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(username) else {
            return true;
        };

        if let Some(banned_until) = entry.banned_until {
            if now < banned_until {
                return false;
            }
            entries.remove(username);
        }

        true
    }

    /// Count a failed attempt, banning the username once the limit is reached.
    /// Names no account could have are not tracked.
    pub async fn record_failure(&self, username: &str) {
        self.record_failure_at(username, Instant::now()).await
    }

    async fn record_failure_at(&self, username: &str, now: Instant) {
        if validate_username(username).is_err() {
            return;
        }

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, attempts| !attempts.is_stale(now, self.config.window));
        if entries.len() < before {
            debug!("Dropped {} stale login throttle entries", before - entries.len());
        }

        let entry = entries.entry(username.to_string()).or_insert(Attempts {
            failures: 0,
            window_start: now,
            banned_until: None,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.failures = 0;
            entry.window_start = now;
        }

        entry.failures += 1;
        if entry.failures >= self.config.max_attempts && entry.banned_until.is_none() {
            entry.banned_until = Some(now + self.config.ban);
            warn!(
                "Throttling logins for {} for {} seconds",
                username,
                self.config.ban.as_secs()
            );
        }
    }

    /// Forget the failures of a username after a successful login
    pub async fn reset(&self, username: &str) {
        self.entries.lock().await.remove(username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> LoginThrottle {
        LoginThrottle::new(ThrottleConfig {
            max_attempts: 3,
            window: Duration::from_secs(60),
            ban: Duration::from_secs(120),
        })
    }

    #[tokio::test]
    async fn test_ban_after_max_failures() {
        let throttle = throttle();
        let start = Instant::now();

        for _ in 0..2 {
            throttle.record_failure_at("alice", start).await;
        }
        assert!(throttle.is_allowed_at("alice", start).await);

        throttle.record_failure_at("alice", start).await;
        assert!(!throttle.is_allowed_at("alice", start).await);
        assert!(throttle.is_allowed_at("bob", start).await);

        let after_ban = start + Duration::from_secs(121);
        assert!(throttle.is_allowed_at("alice", after_ban).await);
    }

    #[tokio::test]
    async fn test_failures_outside_window_are_forgotten() {
        let throttle = throttle();
        let start = Instant::now();

        throttle.record_failure_at("alice", start).await;
        throttle.record_failure_at("alice", start).await;
        let later = start + Duration::from_secs(61);
        throttle.record_failure_at("alice", later).await;

        assert!(throttle.is_allowed_at("alice", later).await);
    }

    #[tokio::test]
    async fn test_stale_entries_are_reclaimed() {
        let throttle = throttle();
        let start = Instant::now();

        for i in 0..50 {
            throttle.record_failure_at(&format!("user_{i}"), start).await;
        }
        for _ in 0..3 {
            throttle.record_failure_at("banned", start).await;
        }
        assert_eq!(throttle.entries.lock().await.len(), 51);

        // past the window but inside the ban
        let later = start + Duration::from_secs(61);
        throttle.record_failure_at("alice", later).await;
        {
            let entries = throttle.entries.lock().await;
            assert_eq!(entries.len(), 2);
            assert!(entries.contains_key("banned"));
            assert!(entries.contains_key("alice"));
        }
        assert!(!throttle.is_allowed_at("banned", later).await);

        let after_ban = start + Duration::from_secs(200);
        throttle.record_failure_at("bob_1", after_ban).await;
        let entries = throttle.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("bob_1"));
    }

    #[tokio::test]
    async fn test_invalid_usernames_are_not_tracked() {
        let throttle = throttle();
        let start = Instant::now();

        throttle.record_failure_at("no spaces allowed", start).await;
        throttle.record_failure_at(&"x".repeat(500), start).await;
        throttle.record_failure_at("", start).await;

        assert!(throttle.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_failures() {
        let throttle = throttle();
        for _ in 0..3 {
            throttle.record_failure("alice").await;
        }
        assert!(!throttle.is_allowed("alice").await);

        throttle.reset("alice").await;
        assert!(throttle.is_allowed("alice").await);
    }
}
