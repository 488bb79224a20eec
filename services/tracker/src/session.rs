//! Session management backed by the session repository
//!
//! Tokens travel in the `sesh` cookie. Expired rows are not swept by a timer:
//! the first validation that trips over one deletes every expired session in
//! the background.

use chrono::{DateTime, Duration, Utc};
use common::DatabaseError;
use rand::{Rng, distributions::Alphanumeric};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::Session;
use crate::repositories::SessionRepository;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "sesh";

const TOKEN_LENGTH: usize = 48;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session token supplied")]
    Unauthenticated,

    #[error("session not found")]
    NotFound,

    #[error("session expired")]
    Expired,

    #[error("session storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Session manager for issuing, validating and revoking session tokens
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(sessions: Arc<dyn SessionRepository>, ttl: Duration) -> Self {
        Self { sessions, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a new session for a user and return its token
    pub async fn create_session(&self, username: &str) -> Result<String, SessionError> {
        self.create_session_at(username, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let session = Session {
            token: generate_token(),
            username: username.to_string(),
            expires_at: now + self.ttl,
        };
        self.sessions.create(&session).await?;
        info!("Created session for user: {}", username);

        Ok(session.token)
    }

    /// Resolve a token to the username owning it
    pub async fn validate_session(&self, token: Option<&str>) -> Result<String, SessionError> {
        self.validate_session_at(token, Utc::now()).await
    }

    pub async fn validate_session_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(SessionError::Unauthenticated),
        };

        let session = self
            .sessions
            .find_by_token(token)
            .await?
            .ok_or(SessionError::NotFound)?;

        if session.is_expired_at(now) {
            debug!("Session for {} expired at {}", session.username, session.expires_at);
            self.spawn_cleanup(now);
            return Err(SessionError::Expired);
        }

        Ok(session.username)
    }

    /// Delete a session. Returns false when the token was unknown.
    pub async fn revoke_session(&self, token: &str) -> Result<bool, SessionError> {
        let deleted = self.sessions.delete(token).await?;
        if deleted {
            info!("Revoked session");
        }

        Ok(deleted)
    }

    /// Delete every session that expired before `now`
    pub async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let removed = self.sessions.delete_expired(now).await?;
        info!("Cleaned up {} expired sessions", removed);

        Ok(removed)
    }

    fn spawn_cleanup(&self, now: DateTime<Utc>) {
        let manager = self.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.cleanup_expired_sessions(now).await {
                warn!("Expired session cleanup failed: {}", e);
            }
        });
    }
}

/// Random alphanumeric token drawn from the thread-local CSPRNG
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Pull the session token out of a `Cookie` header, ignoring every other cookie
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name.trim() == SESSION_COOKIE).then(|| value.trim())
    })
}

/// `Set-Cookie` value carrying a fresh token
pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        token,
        max_age.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::zero(), secure)
}
