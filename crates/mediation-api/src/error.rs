//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from mediation-disputes and mediation-core to HTTP
//! status codes. Returns JSON error bodies with an error code, a message
//! and, for field-scoped failures, a field-keyed `details` map:
//!
//! ```json
//! {"error": {"code": "VALIDATION_ERROR",
//!            "message": "You cannot set yourself as an opponent.",
//!            "details": {"opponent": ["You cannot set yourself as an opponent."]}}}
//! ```
//!
//! Never exposes internal error details in responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use mediation_disputes::DisputeError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Field-keyed messages, present only for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Build a body without details.
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or not visible to the caller (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// A field failed validation or a business rule (400).
    #[error("validation error on {field}: {message}")]
    Validation {
        /// Request field the message is reported under.
        field: String,
        /// Client-facing message.
        message: String,
    },

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failure: missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization failure: insufficient permissions (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness conflict with an existing resource (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request body exceeds the configured limit (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Field-scoped validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Adapter for `map_err`: report any displayable error under `field`.
    pub fn invalid<E: std::fmt::Display>(field: &'static str) -> impl FnOnce(E) -> Self {
        move |err| Self::validation(field, err.to_string())
    }

    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Log internal errors for operator visibility.
        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let (message, details) = match self {
            // Never expose internal error messages to clients.
            Self::Internal(_) => ("An internal error occurred".to_string(), None),
            Self::Validation { field, message } => {
                let mut details = serde_json::Map::new();
                details.insert(field, serde_json::json!([message.clone()]));
                (message, Some(serde_json::Value::Object(details)))
            }
            Self::NotFound(m)
            | Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::Conflict(m)
            | Self::PayloadTooLarge(m) => (m, None),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert dispute rule errors: refusals become 403, everything else a
/// field-scoped 400.
impl From<DisputeError> for AppError {
    fn from(err: DisputeError) -> Self {
        if err.is_forbidden() {
            Self::Forbidden(err.to_string())
        } else {
            Self::validation(err.field(), err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::validation("opponent", "bad"),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::PayloadTooLarge("x".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[test]
    fn dispute_error_mapping() {
        match AppError::from(DisputeError::SelfOpponent) {
            AppError::Validation { field, message } => {
                assert_eq!(field, "opponent");
                assert_eq!(message, "You cannot set yourself as an opponent.");
            }
            other => panic!("expected Validation, got: {other:?}"),
        }
        assert!(matches!(
            AppError::from(DisputeError::MediatorDelete),
            AppError::Forbidden(_)
        ));
    }

    #[test]
    fn error_body_skips_missing_details() {
        let json = serde_json::to_string(&ErrorBody::new("TEST", "test message")).unwrap();
        assert!(json.contains("test message"));
        assert!(!json.contains("details"));
    }

    // ── into_response tests ──────────────────────────────────────

    /// Helper to extract status and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn into_response_validation_carries_field_map() {
        let (status, body) =
            response_parts(AppError::from(DisputeError::CommentOnClosed)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"]["message"],
            "Cannot add a comment to a closed dispute."
        );
        assert_eq!(
            body["error"]["details"]["detail"][0],
            "Cannot add a comment to a closed dispute."
        );
    }

    #[tokio::test]
    async fn into_response_forbidden_uses_plain_message() {
        let (status, body) = response_parts(AppError::Forbidden("nope".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
        assert_eq!(body["error"]["message"], "nope");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
