//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use geocam_core::GeoCamError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// GeoCam core error
    #[error("GeoCam error: {0}")]
    GeoCam(#[from] GeoCamError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::GeoCam(e) => match e {
                // Client-provided invalid input → 400
                GeoCamError::ImageLoadFailure(_)
                | GeoCamError::MalformedPayload(_)
                | GeoCamError::MalformedMetadata(_)
                | GeoCamError::InvalidSignatureEncoding(_)
                | GeoCamError::InvalidPublicKey(_)
                | GeoCamError::UnsupportedAlgorithm(_)
                | GeoCamError::InvalidParameter(_)
                | GeoCamError::CapacityExceeded { .. }
                | GeoCamError::PayloadNotFound => StatusCode::BAD_REQUEST,

                GeoCamError::HostTimeout { .. } => StatusCode::REQUEST_TIMEOUT,

                // External service failures → 503
                GeoCamError::HttpError(_) => StatusCode::SERVICE_UNAVAILABLE,

                // Internal processing failures → 500
                GeoCamError::ImageEncodeFailure(_)
                | GeoCamError::KeyGeneration(_)
                | GeoCamError::KeyStore(_)
                | GeoCamError::SerializationError(_)
                | GeoCamError::HostFailure(_)
                | GeoCamError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::GeoCam(e) => match e {
                GeoCamError::ImageLoadFailure(_) => "INVALID_IMAGE",
                GeoCamError::MalformedPayload(_) | GeoCamError::MalformedMetadata(_) => {
                    "MALFORMED_PAYLOAD"
                }
                GeoCamError::InvalidSignatureEncoding(_) => "INVALID_SIGNATURE_ENCODING",
                GeoCamError::InvalidPublicKey(_) | GeoCamError::UnsupportedAlgorithm(_) => {
                    "INVALID_KEY"
                }
                GeoCamError::InvalidParameter(_) => "INVALID_PARAMETER",
                GeoCamError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
                GeoCamError::PayloadNotFound => "PAYLOAD_NOT_FOUND",
                GeoCamError::HostTimeout { .. } => "TIMEOUT",
                GeoCamError::HttpError(_) => "UPSTREAM_ERROR",
                GeoCamError::ImageEncodeFailure(_)
                | GeoCamError::KeyGeneration(_)
                | GeoCamError::KeyStore(_)
                | GeoCamError::SerializationError(_)
                | GeoCamError::HostFailure(_)
                | GeoCamError::Io(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::GeoCam(e) => match e {
                GeoCamError::ImageLoadFailure(_) => "Image could not be decoded".to_string(),
                GeoCamError::HostTimeout { .. } => "Verification timed out".to_string(),
                GeoCamError::HttpError(_) => "Upstream service error".to_string(),
                GeoCamError::ImageEncodeFailure(_)
                | GeoCamError::KeyGeneration(_)
                | GeoCamError::KeyStore(_)
                | GeoCamError::SerializationError(_)
                | GeoCamError::HostFailure(_)
                | GeoCamError::Io(_) => "Internal processing error".to_string(),
                other => other.to_string(),
            },
            Self::BadRequest(_) => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::GeoCam(_) => "geocam",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
