//! Password hashing and credential verification

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use common::DatabaseError;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, error};

use crate::repositories::UserRepository;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Checks username/password pairs against stored Argon2 digests
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Salted Argon2id digest in PHC string form
    pub async fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_password(&password)).await?
    }

    /// True when the user exists and the password matches its digest.
    /// An unknown user costs the same hash work as a wrong password.
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, CredentialError> {
        let user = self.users.find_by_username(username).await?;
        let known = user.is_some();
        let digest = user.map(|user| user.password_hash);

        let password = password.to_string();
        let matched = tokio::task::spawn_blocking(move || match digest.as_deref() {
            Some(digest) => verify_password(&password, digest),
            None => verify_password(&password, dummy_digest()),
        })
        .await?;

        if !known {
            debug!("Login attempt for unknown user");
        }

        Ok(known && matched)
    }
}

fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

fn verify_password(password: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Stored password digest is malformed: {}", e);
            false
        }
    }
}

fn dummy_digest() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("not-a-real-password").unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::repositories::MemoryStore;

    #[tokio::test]
    async fn test_verify_matches_only_the_right_password() {
        let store = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::new(store.clone());
        let digest = credentials.hash("pw123456").await.unwrap();
        assert!(digest.starts_with("$argon2"));

        store
            .create(&NewUser {
                username: "alice".to_string(),
                display_name: "Alice".to_string(),
                password_hash: digest,
            })
            .await
            .unwrap();

        assert!(credentials.verify("alice", "pw123456").await.unwrap());
        assert!(!credentials.verify("alice", "pw1234567").await.unwrap());
        assert!(!credentials.verify("bob", "pw123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_is_salted() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        let first = credentials.hash("pw123456").await.unwrap();
        let second = credentials.hash("pw123456").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_user_is_checked_against_dummy_digest() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        assert!(dummy_digest().starts_with("$argon2"));
        assert!(!credentials.verify("nobody", "not-a-real-password").await.unwrap());
    }

    #[test]
    fn test_malformed_digest_never_verifies() {
        assert!(!verify_password("pw123456", "not a phc string"));
    }
}
