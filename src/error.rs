/// Error types for the invitation and review lifecycle
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Operation attempted from a state that forbids it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A uniqueness invariant would be violated
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// File write/delete failed
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Stale version on an optimistic update
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidState(_) => (StatusCode::CONFLICT, "InvalidState"),
            AppError::Duplicate(_) => (StatusCode::CONFLICT, "Duplicate"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "StorageError"),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
            }
        };

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                "File storage failed".to_string()
            }
            _ => self.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: code,
                message,
            }),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
