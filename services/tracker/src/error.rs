//! HTTP boundary errors
//!
//! Every failure leaves the service as `{status, message}`. Storage detail is
//! logged here and never returned to the client.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::credentials::CredentialError;
use crate::guard::ResourceError;
use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(SessionError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Session(_) | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Session(SessionError::Storage(_)) | ApiError::Internal(_) => {
                "internal server error".to_string()
            }
            ApiError::Session(SessionError::Unauthenticated) => "not logged in".to_string(),
            ApiError::Session(_) => "session invalid or expired".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<ResourceError> for ApiError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound(what) => ApiError::NotFound(what),
            ResourceError::Forbidden => ApiError::Forbidden,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(message) => ApiError::Conflict(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(SessionError::Unauthenticated).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(SessionError::Expired).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ResourceError::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ResourceError::NotFound("task")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DatabaseError::Conflict("taken".to_string())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ResourceError::Timeout).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_detail_is_hidden() {
        let err = ApiError::from(DatabaseError::Configuration("password=hunter2".to_string()));
        assert_eq!(err.public_message(), "internal server error");

        let err = ApiError::from(SessionError::Storage(DatabaseError::Configuration(
            "host".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");
    }
}
