//! HTTP boundary
//!
//! Axum router for the profile synchronization endpoint. Requests pass
//! admission, then region affinity, then the handler. Only this module turns
//! [`SyncError`] into HTTP responses.

pub mod app;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use app::build_router;
pub use state::AppState;

use crate::core::{StorageError, SyncError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error returned by handlers and middleware.
#[derive(Debug)]
pub struct WebError(pub SyncError);

impl From<SyncError> for WebError {
    fn from(err: SyncError) -> Self {
        WebError(err)
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::MissingRegionMetadata
            | SyncError::InvalidProfileType { .. }
            | SyncError::InvalidCommand { .. } => StatusCode::BAD_REQUEST,
            SyncError::ProfileNotFound { .. } => StatusCode::NOT_FOUND,
            SyncError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SyncError::Storage(StorageError::Conflict { .. }) => StatusCode::CONFLICT,
            SyncError::Storage(StorageError::Backend(_)) | SyncError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            SyncError::PartitionUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();
        let code = self.0.code().to_string();

        if status.is_server_error() {
            error!(status = %status, code = %code, error = %message, "request failed");
        }

        let body = Json(ErrorResponse {
            error: message,
            code,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
