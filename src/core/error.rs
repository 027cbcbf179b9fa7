//! Error types and handling for the gateway.
//!
//! This module provides a unified error type [`AppError`] that covers every
//! failure a caller can observe and implements the OpenAI-style error
//! envelope `{"error": {"message", "type", "param"?, "code"?}}`.

use crate::core::error_types::{
    UpstreamErrorKind, ERROR_CODE_IMAGE_GENERATION_DISABLED, ERROR_CODE_INVALID_SIZE,
    ERROR_TYPE_API, ERROR_TYPE_AUTHENTICATION, ERROR_TYPE_INVALID_REQUEST,
    ERROR_TYPE_SERVICE_UNAVAILABLE, ERROR_TYPE_TIMEOUT,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// No bearer token on a POST endpoint.
    #[error("Missing API key. Provide it as 'Authorization: Bearer <token>'")]
    MissingCredential,

    /// Image size outside the supported enumeration.
    #[error("Invalid size '{0}'. Supported sizes are 1024x1024, 1792x1024 and 1024x1792")]
    InvalidSize(String),

    /// Request body could not be decoded for the endpoint.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Image generation is switched off, or a non-square size was requested
    /// while `aspect` is not an extra parameter.
    #[error("Image generation for the requested size is not enabled on this gateway")]
    ImageGenerationDisabled,

    /// Upstream answered with a non-2xx status.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The upstream call failed outright (connect, timeout, broken body).
    #[error("Upstream request timed out or could not be completed")]
    Network(#[source] reqwest::Error),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCredential => StatusCode::UNAUTHORIZED,
            AppError::InvalidSize(_) | AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::ImageGenerationDisabled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Network(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::MissingCredential => ERROR_TYPE_AUTHENTICATION,
            AppError::InvalidSize(_) | AppError::InvalidBody(_) => ERROR_TYPE_INVALID_REQUEST,
            AppError::ImageGenerationDisabled => ERROR_TYPE_SERVICE_UNAVAILABLE,
            AppError::Upstream { status, .. } => UpstreamErrorKind::from_status(*status).as_str(),
            AppError::Network(_) => ERROR_TYPE_TIMEOUT,
            AppError::Internal(_) => ERROR_TYPE_API,
        }
    }

    /// Caller-facing message. Upstream messages are relayed as-is.
    pub fn message(&self) -> String {
        match self {
            AppError::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Build the `{"error": {...}}` envelope.
    pub fn to_body(&self) -> Value {
        let mut error = Map::new();
        error.insert("message".to_string(), json!(self.message()));
        error.insert("type".to_string(), json!(self.error_type()));
        match self {
            AppError::InvalidSize(_) => {
                error.insert("param".to_string(), json!("size"));
                error.insert("code".to_string(), json!(ERROR_CODE_INVALID_SIZE));
            }
            AppError::ImageGenerationDisabled => {
                error.insert(
                    "code".to_string(),
                    json!(ERROR_CODE_IMAGE_GENERATION_DISABLED),
                );
            }
            AppError::Upstream { status, .. } => {
                error.insert("code".to_string(), json!(status));
            }
            _ => {}
        }
        json!({ "error": error })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(self.to_body())).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
