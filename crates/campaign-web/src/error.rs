//! Error types for the campaign API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use dispatcher::DispatchError;
use thiserror::Error;

/// Errors that can occur in the campaign API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Dispatch engine error.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Request failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed request body or multipart payload.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Not-found and rejection outcomes are user-visible as-is;
        // everything else is logged and surfaced generically.
        let (status, message) = match &self {
            ApiError::Database(DatabaseError::NotFound { .. })
            | ApiError::Dispatch(DispatchError::Database(DatabaseError::NotFound { .. })) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::Dispatch(err @ DispatchError::Rejected { .. })
            | ApiError::Dispatch(err @ DispatchError::ItemNotRetryable { .. }) => {
                (StatusCode::CONFLICT, err.to_string())
            }
            ApiError::Dispatch(DispatchError::Parse(err)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("file parse error: {err}"),
            ),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ApiError::Dispatch(err) => {
                tracing::error!("Dispatch error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
