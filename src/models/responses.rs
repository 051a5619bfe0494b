//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::time::Duration;

use serde::Serialize;

use crate::cache::Value;

/// Milliseconds in `d`, saturating for forever entries.
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Response body for GET /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Remaining lifetime in milliseconds
    pub ttl_ms: u64,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: Value, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            ttl_ms: duration_ms(ttl),
        }
    }
}

/// Response body for PUT /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    /// Success message
    pub message: String,
    /// The key that was stored
    pub key: String,
}

impl PutResponse {
    /// Creates a new PutResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' stored successfully", key),
            key,
        }
    }
}

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for POST /cache/:key/increment
#[derive(Debug, Clone, Serialize)]
pub struct IncrementResponse {
    pub key: String,
    /// Value after the increment
    pub value: Value,
}

/// Rate limiter status for /limits/:key endpoints
#[derive(Debug, Clone, Serialize)]
pub struct LimitResponse {
    pub key: String,
    pub retries_left: u32,
    pub total_attempts: u32,
    pub must_lock: bool,
    /// Time until the window resets, in milliseconds
    pub available_in_ms: u64,
}

/// Response body for POST /codes/:key
///
/// The code itself is delivered out of band and never echoed.
#[derive(Debug, Clone, Serialize)]
pub struct CodeIssuedResponse {
    pub key: String,
    pub length: usize,
    pub expires_in_ms: u64,
}

/// Response body for POST /codes/:key/verify
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub key: String,
    pub valid: bool,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Storage engine serving requests
    pub backend: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(backend: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            backend: backend.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
