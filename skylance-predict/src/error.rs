//! Error types for skylance-predict
//!
//! `Error` covers pipeline faults; `ApiError` maps them onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline error type
#[derive(Error, Debug)]
pub enum Error {
    /// Startup misconfiguration: artifact, schema or store layout
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store connectivity or statement failure
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Fetched values that cannot form a valid feature frame
    #[error("Feature error: {0}")]
    Feature(String),

    /// Scorer rejected the frame or returned unusable output
    #[error("Scorer error: {0}")]
    Scorer(String),

    /// Entity id that does not parse as the target's key type
    #[error("Invalid {entity} id: '{value}'")]
    InvalidKey { entity: String, value: String },

    #[error(transparent)]
    Common(#[from] skylance_common::Error),
}

/// Convenience Result type using the pipeline Error
pub type Result<T> = std::result::Result<T, Error>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Pipeline failure (500)
    #[error(transparent)]
    Pipeline(#[from] Error),

    /// Response could not be produced (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Pipeline(err @ Error::InvalidKey { .. }) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string())
            }
            ApiError::Pipeline(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
