use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

/// Client-facing error taxonomy for the whole service.
///
/// Validation and conflict errors carry their message to the client;
/// `Internal` is logged with detail and surfaced as a generic message only.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Validation(String),
    #[error("short code already in use")]
    CodeConflict,
    #[error("no URL found with that code")]
    NotFound,
    #[error("identity required for this operation")]
    Unauthorized,
    #[error("too many requests, try again later")]
    RateLimited,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUrl(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::CodeConflict => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "invalid_url",
            Self::Validation(_) => "validation_error",
            Self::CodeConflict => "code_conflict",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "too_many_requests",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::CodeConflict,
            StorageError::Other(err) => Self::Internal(err),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(err) => {
                tracing::error!(error = %err, "request failed with internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}
