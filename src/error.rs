//! Error types for the cache contract
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::cache::{CastError, DecodeError};
use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for backends and the primitives built on them.
///
/// Absence is only an error where the contract requires presence
/// (`ttl`, `increment_by`, strict typed reads, limiter and code
/// operations). `get`, `exists`, `forget` and `pull` report absence as
/// a normal value instead.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key required to exist is absent or expired
    #[error("{backend}: key not found: {key}")]
    NotFound { backend: &'static str, key: String },

    /// Storage I/O failed
    #[error("{backend}: I/O error on key {key}: {source}")]
    Io {
        backend: &'static str,
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Stored record could not be decoded
    #[error("{backend}: unreadable record for key {key}: {source}")]
    Codec {
        backend: &'static str,
        key: String,
        #[source]
        source: DecodeError,
    },

    /// Stored value is not representable as the requested type
    #[error("{backend}: cannot read key {key}: {source}")]
    Cast {
        backend: &'static str,
        key: String,
        #[source]
        source: CastError,
    },

    /// Rate limiter has no attempts left in the current window
    #[error("rate limit exhausted: {key}")]
    Exhausted { key: String },

    /// Backend internal failure
    #[error("{backend}: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    /// Invalid caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Returns true when the error only signals an absent key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }

    pub(crate) fn not_found(backend: &'static str, key: &str) -> Self {
        CacheError::NotFound {
            backend,
            key: key.to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound { .. } => StatusCode::NOT_FOUND,
            CacheError::Exhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            CacheError::Cast { .. } | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Io { .. } | CacheError::Codec { .. } | CacheError::Backend { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
