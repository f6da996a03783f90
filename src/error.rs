//! HTTP-boundary error taxonomy (§7).
//!
//! Internal module errors (`StoreError`, `PipelineError`, `VisionError`,
//! `WebhookError`) are typed enums in their own modules and convert into
//! [`ApiError`] only here, at the HTTP boundary — workers and the janitor
//! consume them directly without going through this type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::pipeline::PipelineError;
use crate::store::StoreError;

/// Semantic error kinds surfaced over HTTP (§7).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request input: bad webhook URL, path traversal.
    #[error("{0}")]
    Validation(String),

    /// Multipart body carried no `file` field.
    #[error("no file provided")]
    MissingFile,

    /// Upload exceeded `max_upload_size`.
    #[error("upload exceeds maximum size")]
    SizeExceeded,

    /// Unknown task ID.
    #[error("task not found")]
    NotFound,

    /// Task has expired and its files are gone.
    #[error("task has expired")]
    Gone,

    /// Operation requires `completed` state.
    #[error("task is not completed (status: {0})")]
    PreconditionFailed(String),

    /// Otherwise-unclassified store or I/O fault.
    #[error("internal server error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::AlreadyExists(_) | StoreError::Database(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SizeExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Gone => StatusCode::GONE,
            Self::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed with internal error");
        }

        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_size_exceeded_maps_to_413() {
        let response = ApiError::SizeExceeded.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_gone_maps_to_410() {
        let response = ApiError::Gone.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[test]
    fn test_missing_file_maps_to_422() {
        let response = ApiError::MissingFile.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_maps_to_500() {
        let response = ApiError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
