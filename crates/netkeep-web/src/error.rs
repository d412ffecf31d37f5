//! JSON error responses.
//!
//! Every failure renders as `{"ok": false, "error": <code>, "message": ...}`
//! with a status code derived from the error kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use netkeep_core::{CredentialError, ErrorCode};
use thiserror::Error;

/// An error rendered as a JSON body.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "no such route")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        let status = match &err {
            CredentialError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CredentialError::OutOfRange(_) => StatusCode::NOT_FOUND,
            CredentialError::NoFreeSlots => StatusCode::CONFLICT,
            CredentialError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        }
        let body = serde_json::json!({
            "ok": false,
            "error": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
