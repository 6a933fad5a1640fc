//! Error types for vgate-ad

use crate::models::Outcome;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the access decision engine
#[derive(Debug, Error)]
pub enum AccessError {
    /// No ledger entry with this id
    #[error("Access attempt not found: {id}")]
    NotFound { id: Uuid },

    /// Override to the outcome the attempt already has, into `pending`,
    /// or lost a race with a concurrent override
    #[error("Invalid transition for attempt {id}: {from} -> {to}")]
    InvalidTransition { id: Uuid, from: Outcome, to: Outcome },

    /// Actor lacks the role required for the action
    #[error("Actor '{actor}' is not allowed to {action}")]
    Forbidden { actor: String, action: &'static str },

    /// Registry could not be read and fallback is disabled
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Ledger write or read failed
    #[error("Ledger persistence failed: {0}")]
    Persistence(String),

    /// Rejected request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<vgate_common::Error> for AccessError {
    fn from(err: vgate_common::Error) -> Self {
        match err {
            vgate_common::Error::InvalidInput(msg) => AccessError::InvalidInput(msg),
            other => AccessError::Persistence(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AccessError {
    fn from(err: sqlx::Error) -> Self {
        AccessError::Persistence(err.to_string())
    }
}

/// Result type for engine operations
pub type AccessResult<T> = Result<T, AccessError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine error, mapped to its HTTP status
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Access(err) => match err {
                AccessError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                AccessError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION")
                }
                AccessError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                AccessError::RegistryUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "REGISTRY_UNAVAILABLE")
                }
                AccessError::Persistence(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR")
                }
                AccessError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
