//! Error kinds shared by the auth and document services.
//!
//! Store and cache failures are surfaced as `Internal` without retry; the
//! HTTP layer maps each kind to a status code and the `{"error": ...}`
//! envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input rejected before it reached a store.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing, invalid or expired token, wrong admin token, or bad credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),

    /// Absent, or invisible to the caller.
    #[error("{0}")]
    NotFound(String),

    /// Unique constraint violation (duplicate login).
    #[error("{0}")]
    Conflict(String),

    /// A store or cache call did not finish before the operation deadline.
    #[error("operation `{0}` exceeded its deadline")]
    Cancelled(&'static str),

    /// Storage or cache failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to a client. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<surrealdb::Error> for ServiceError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: u16,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }

        let body = ErrorResponse {
            error: ErrorInfo {
                code: status.as_u16(),
                text: self.user_message(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServiceError::invalid("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::unauthorized("no").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("owner only".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::not_found("gone").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Cancelled("list_documents").status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ServiceError::Internal("db down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_not_leaked() {
        let err = ServiceError::Internal("connection refused on 10.0.0.3".into());
        assert_eq!(err.user_message(), "Internal server error");

        let err = ServiceError::NotFound("Document not found".into());
        assert_eq!(err.user_message(), "Document not found");
    }

    #[test]
    fn test_anyhow_conversion_is_internal() {
        let err: ServiceError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, ServiceError::Internal(msg) if msg.contains("boom")));
    }
}
