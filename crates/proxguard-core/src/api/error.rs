//! API error types mapping core outcomes to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error type for API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource type
        resource: &'static str,
        /// Resource identifier
        id: String,
    },

    /// Invalid request data (400)
    #[error("Bad request: {message}")]
    BadRequest {
        /// What was wrong
        message: String,
    },
}

impl ApiError {
    /// Not-found error for a device.
    pub fn device_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: "Device",
            id: id.into(),
        }
    }

    /// Bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::BadRequest { .. } => "BAD_REQUEST",
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        };
        tracing::warn!(error = %self, "API error");
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
