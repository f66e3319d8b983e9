//! API error types

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kavach_ai::InferenceError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Endpoint failures. Every variant renders as `{"error": "<message>"}`.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed request payload; no model work was attempted.
    #[error("{0}")]
    Validation(String),

    /// Upload exceeded the configured body limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Uploaded bytes are not a decodable image.
    #[error("{0}")]
    Decode(String),

    /// Preprocessing, forward pass, or postprocessing failed.
    #[error("{0}")]
    Inference(String),

    /// The inference task itself failed (panic or cancellation).
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Decode(_) | Self::Inference(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        match &err {
            InferenceError::Decode(_) => Self::Decode(err.to_string()),
            _ => Self::Inference(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("inference task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            warn!(status = status.as_u16(), error = %self, "rejected request");
        } else {
            error!(status = status.as_u16(), error = %self, "request failed");
        }

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
