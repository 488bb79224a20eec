//! Service settings loaded from `TRACKER_*` environment variables

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

use crate::rate_limiter::ThrottleConfig;

/// Where entities are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_address: String,
    pub storage: StorageBackend,
    pub session_ttl_days: i64,
    /// Upper bound for a single repository call
    pub fetch_timeout_ms: u64,
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub login_ban_seconds: u64,
    /// Add the `Secure` attribute to the session cookie
    pub secure_cookies: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            storage: StorageBackend::Postgres,
            session_ttl_days: 30,
            fetch_timeout_ms: 5000,
            login_max_attempts: 5,
            login_window_seconds: 300,
            login_ban_seconds: 900,
            secure_cookies: false,
        }
    }
}

impl Settings {
    /// Defaults overridden by `TRACKER_<FIELD>` variables, e.g. `TRACKER_STORAGE=memory`
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let settings: Settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("storage", "postgres")?
            .set_default("session_ttl_days", defaults.session_ttl_days)?
            .set_default("fetch_timeout_ms", defaults.fetch_timeout_ms as i64)?
            .set_default("login_max_attempts", defaults.login_max_attempts as i64)?
            .set_default("login_window_seconds", defaults.login_window_seconds as i64)?
            .set_default("login_ban_seconds", defaults.login_ban_seconds as i64)?
            .set_default("secure_cookies", defaults.secure_cookies)?
            .add_source(Environment::with_prefix("TRACKER").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if settings.session_ttl_days <= 0 {
            return Err(ConfigError::Message(
                "session_ttl_days must be positive".to_string(),
            ));
        }
        if settings.fetch_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "fetch_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(settings)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig {
            max_attempts: self.login_max_attempts,
            window: Duration::from_secs(self.login_window_seconds),
            ban: Duration::from_secs(self.login_ban_seconds),
        }
    }
}
