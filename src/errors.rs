//! Structured error types shared by the engine and the HTTP layer.
//!
//! Errors carry machine-readable codes for clients; full detail is logged
//! server-side and never leaked through the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error types with proper categorization
#[derive(Debug)]
pub enum AppError {
    // Validation errors (400)
    InvalidInput { field: String, reason: String },
    ContentTooLarge { size: usize, max: usize },

    /// Demask input references spans that are out of bounds or do not
    /// hold the claimed placeholder token (400)
    MalformedEntityList(String),

    /// The name recognizer failed to load or to run. Masking without name
    /// redaction must never be returned as success, so this aborts the
    /// whole request (503)
    DetectorUnavailable(String),

    /// The ticket classifier failed to load or to run (500)
    ClassifierError(String),

    // Service errors (503)
    ServiceUnavailable(String),

    // Generic wrapper for external errors (500)
    Internal(anyhow::Error),
}

impl AppError {
    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::ContentTooLarge { .. } => "CONTENT_TOO_LARGE",
            Self::MalformedEntityList(_) => "MALFORMED_ENTITY_LIST",
            Self::DetectorUnavailable(_) => "DETECTOR_UNAVAILABLE",
            Self::ClassifierError(_) => "CLASSIFIER_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. }
            | Self::ContentTooLarge { .. }
            | Self::MalformedEntityList(_) => StatusCode::BAD_REQUEST,

            Self::DetectorUnavailable(_) | Self::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            Self::ClassifierError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get detailed error message
    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::ContentTooLarge { size, max } => {
                format!("Content too large: {size} bytes (max: {max} bytes)")
            }
            Self::MalformedEntityList(msg) => format!("Malformed entity list: {msg}"),
            Self::DetectorUnavailable(msg) => format!("Name detector unavailable: {msg}"),
            Self::ClassifierError(msg) => format!("Classifier error: {msg}"),
            Self::ServiceUnavailable(msg) => format!("Service unavailable: {msg}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
            details: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Axum IntoResponse implementation for proper HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Operators get the full picture; clients get the code.
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self.message());
        } else {
            tracing::debug!(code = self.code(), "{}", self.message());
        }

        let body = self.to_response();
        (status, Json(body)).into_response()
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::MalformedEntityList("bad span".to_string()).code(),
            "MALFORMED_ENTITY_LIST"
        );
        assert_eq!(
            AppError::DetectorUnavailable("no model".to_string()).code(),
            "DETECTOR_UNAVAILABLE"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::InvalidInput {
                field: "email_body".to_string(),
                reason: "not a string".to_string(),
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DetectorUnavailable("gone".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::ClassifierError("failed".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_serialization() {
        let err = AppError::ContentTooLarge {
            size: 9000,
            max: 100,
        };
        let response = err.to_response();

        assert_eq!(response.code, "CONTENT_TOO_LARGE");
        assert!(response.message.contains("9000"));
    }
}
