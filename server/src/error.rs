//! Unified error handling for the server.

use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Store(e) => {
                tracing::debug!("Store rejected request: {}", e);
                let status = match e {
                    StoreError::InvalidKey(_) | StoreError::BatchTooLarge { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    StoreError::ValueTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    StoreError::QuotaExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
                };
                (status, "Request rejected".to_string(), Some(e.to_string()))
            }
            AppError::NotFound(key) => (
                StatusCode::NOT_FOUND,
                "Not found".to_string(),
                Some(key.clone()),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
