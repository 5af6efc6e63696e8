//! Error types for the dashboard backend

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Dashboard errors
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape or size
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credential
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Resource already exists
    #[error("{0}")]
    Conflict(String),

    /// Request understood but cannot be fulfilled (e.g. video without captions)
    #[error("{0}")]
    Unprocessable(String),

    /// Local daily quota exceeded
    #[error("{message}")]
    RateLimited { message: String, remaining: u32 },

    /// External AI dependency answered 429
    #[error("{0}")]
    UpstreamRateLimited(String),

    /// External AI dependency failed
    #[error("{0}")]
    Upstream(String),

    /// Text could not be derived from an uploaded file
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Create an upstream error
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status this error surfaces as
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::RateLimited { .. } | Error::UpstreamRateLimited(_) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Error::Upstream(_)
            | Error::Extraction(_)
            | Error::Config(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Http(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Extractor rejections: client mistakes become validation errors
fn from_rejection(status: StatusCode, text: String) -> Error {
    if status.is_server_error() {
        Error::Internal(text)
    } else {
        Error::Validation(text)
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        from_rejection(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            Error::RateLimited { message, remaining } => json!({
                "error": message,
                "remaining": remaining,
            }),
            // Storage and transport failures are logged, never echoed to clients
            Error::Database(_) | Error::Io(_) | Error::Json(_) | Error::Http(_) | Error::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                json!({ "error": "Internal server error" })
            }
            Error::Upstream(_) | Error::Config(_) | Error::Extraction(_) => {
                tracing::error!("Request failed: {}", self);
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
