//! Custom error types for the common library
//!
//! This module defines the storage error taxonomy shared by every repository
//! in the tracker workspace. A missing row is never an error: repositories
//! return `Ok(None)` for that, so callers can tell "not found" apart from a
//! storage failure.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A write was rejected because it collides with existing data
    /// (unique key taken, dependency cycle, ...)
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl DatabaseError {
    /// Classify a query failure, turning unique-key violations into `Conflict`
    pub fn from_query(err: SqlxError) -> Self {
        match &err {
            SqlxError::Database(db) if db.is_unique_violation() => {
                DatabaseError::Conflict(db.message().to_string())
            }
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                DatabaseError::Connection(err)
            }
            _ => DatabaseError::Query(err),
        }
    }

    /// Whether this error is a conflict with existing data
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
