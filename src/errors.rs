use crate::services::storage_service::StorageError;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Total size advertised on 416 responses as `Content-Range: bytes */size`.
    pub unsatisfied_size: Option<u64>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            unsatisfied_size: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    /// 416 for a byte range that does not fit a file of `size` bytes.
    pub fn range_not_satisfiable(size: u64) -> Self {
        Self {
            unsatisfied_size: Some(size),
            ..Self::new(StatusCode::RANGE_NOT_SATISFIABLE, "range not satisfiable")
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        let mut response = (self.status, body).into_response();
        if let Some(size) = self.unsatisfied_size {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidName(name) => {
                tracing::warn!("rejected file name {:?}", name);
                AppError::forbidden("access denied")
            }
            StorageError::NotFound(_) => AppError::not_found("file not found"),
            StorageError::Decode(err) => {
                tracing::warn!("upload payload failed to decode: {}", err);
                AppError::internal("invalid base64 payload")
            }
            StorageError::Io(err) => {
                tracing::error!("storage I/O failure: {}", err);
                AppError::internal("internal storage error")
            }
        }
    }
}
