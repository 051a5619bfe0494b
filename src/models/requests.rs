//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::Value;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Validates a key taken from the request path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Request body for PUT /cache/:key
///
/// # Fields
/// - `value`: Any JSON scalar (bool, integer, float or string)
/// - `ttl`: Optional TTL in seconds; without it the entry never expires
#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl PutRequest {
    /// Validates the request data
    pub fn validate(&self) -> Option<String> {
        if self.ttl == Some(0) {
            return Some("TTL must be positive".to_string());
        }
        None
    }
}

/// Request body for POST /cache/:key/increment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncrementRequest {
    /// Amount to add, defaults to 1
    #[serde(default)]
    pub by: Option<Value>,
}

impl IncrementRequest {
    /// Validates the request data
    pub fn validate(&self) -> Option<String> {
        match &self.by {
            None | Some(Value::Int(_)) | Some(Value::UInt(_)) | Some(Value::Float(_)) => None,
            Some(other) => Some(format!("Increment must be numeric, got {}", other.kind())),
        }
    }

    /// The delta to apply.
    pub fn delta(&self) -> Value {
        self.by.clone().unwrap_or(Value::Int(1))
    }
}

/// Request body for POST /codes/:key/verify
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    /// Code submitted by the user
    pub code: String,
}
