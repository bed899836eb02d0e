// src/error.rs
// Error types for the aider API

use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::runner::ErrorPayload;

/// Main error type for the aider API library
#[derive(Error, Debug)]
pub enum AiderApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to stage {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("output pipeline failed: {0}")]
    Pipeline(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Result using AiderApiError
pub type Result<T> = std::result::Result<T, AiderApiError>;

impl AiderApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AiderApiError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AiderApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = ErrorPayload {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
