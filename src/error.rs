use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::model::ErrorEnvelope;

/// Failures talking to the Swift Protocol service.
#[derive(Debug, Error)]
pub enum SwiftError {
    #[error("request to Swift API failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("unexpected response from Swift API: {0}")]
    Decode(String),
}

impl SwiftError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SWIFT_API_KEY environment variable is required")]
    MissingApiKey,
}

/// Errors returned by the proxy routes. Every variant renders as
/// `{"status":"error","message":...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    /// Maps a collaborator failure to a 500, falling back to `fallback`
    /// when the error carries no message.
    pub fn upstream(err: &SwiftError, fallback: &str) -> Self {
        let message = err.to_string();
        if message.trim().is_empty() {
            Self::Upstream(fallback.to_string())
        } else {
            Self::Upstream(message)
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorEnvelope::new(self.to_string()))).into_response()
    }
}

/// Failures seen by the view side when calling the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Decode(String),
}
