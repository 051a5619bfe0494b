//! Cache Record Module
//!
//! Defines the stored unit (value plus absolute expiry) and its binary
//! encoding for disk-backed engines.

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::cache::Value;

/// Expiry used by `put_forever`; no wall clock reaches it.
pub const FOREVER: i64 = i64::MAX;

const MAGIC: &[u8; 3] = b"CGR";
const VERSION: u8 = 1;
/// magic + version + expires_at + tag
const HEADER_LEN: usize = 3 + 1 + 8 + 1;

const TAG_BOOL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_UINT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_BYTES: u8 = 5;

// == Decode Error ==
/// Reasons a byte buffer is not a valid record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("record is truncated ({0} bytes)")]
    Truncated(usize),

    #[error("missing record header")]
    BadMagic,

    #[error("unsupported record version {0}")]
    Version(u8),

    #[error("unknown value tag {0}")]
    UnknownTag(u8),

    #[error("payload of {len} bytes does not fit a {kind} value")]
    PayloadLength { kind: &'static str, len: usize },

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}

// == Record ==
/// A single cache entry: the value and the instant it stops being visible.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Expiration timestamp (Unix milliseconds, UTC)
    pub expires_at: i64,
    /// The stored value
    pub value: Value,
}

impl Record {
    // == Constructors ==
    /// Creates a record expiring `ttl` from now.
    ///
    /// A TTL too large to represent saturates to [`FOREVER`].
    pub fn new(value: Value, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            expires_at: current_timestamp_ms().saturating_add(ttl_ms),
            value,
        }
    }

    /// Creates a record that never expires.
    pub fn forever(value: Value) -> Self {
        Self {
            expires_at: FOREVER,
            value,
        }
    }

    // == Is Expired ==
    /// Checks if the record has expired.
    ///
    /// A record is expired once the current time is greater than or equal
    /// to its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining time before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        let left = self.expires_at.saturating_sub(current_timestamp_ms());
        Duration::from_millis(left.max(0) as u64)
    }

    // == Encode ==
    /// Serializes the record into the engine-private binary format.
    ///
    /// Layout: `CGR | version | expires_at (i64 BE) | tag | payload`.
    /// String and byte payloads run to the end of the buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 8);
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&self.expires_at.to_be_bytes());

        match &self.value {
            Value::Bool(v) => {
                buf.push(TAG_BOOL);
                buf.push(*v as u8);
            }
            Value::Int(v) => {
                buf.push(TAG_INT);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::UInt(v) => {
                buf.push(TAG_UINT);
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Float(v) => {
                buf.push(TAG_FLOAT);
                buf.extend_from_slice(&v.to_bits().to_be_bytes());
            }
            Value::String(v) => {
                buf.push(TAG_STRING);
                buf.extend_from_slice(v.as_bytes());
            }
            Value::Bytes(v) => {
                buf.push(TAG_BYTES);
                buf.extend_from_slice(v);
            }
        }

        buf
    }

    // == Decode ==
    /// Parses a buffer produced by [`Record::encode`].
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::Truncated(buf.len()));
        }
        if &buf[..3] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        if buf[3] != VERSION {
            return Err(DecodeError::Version(buf[3]));
        }

        let expires_at = i64::from_be_bytes(word(&buf[4..12], "expiry")?);
        let tag = buf[12];
        let payload = &buf[HEADER_LEN..];

        let value = match tag {
            TAG_BOOL => match payload {
                [b] => Value::Bool(*b != 0),
                _ => {
                    return Err(DecodeError::PayloadLength {
                        kind: "bool",
                        len: payload.len(),
                    })
                }
            },
            TAG_INT => Value::Int(i64::from_be_bytes(word(payload, "int")?)),
            TAG_UINT => Value::UInt(u64::from_be_bytes(word(payload, "uint")?)),
            TAG_FLOAT => Value::Float(f64::from_bits(u64::from_be_bytes(word(
                payload, "float",
            )?))),
            TAG_STRING => Value::String(
                String::from_utf8(payload.to_vec()).map_err(|_| DecodeError::InvalidUtf8)?,
            ),
            TAG_BYTES => Value::Bytes(payload.to_vec()),
            other => return Err(DecodeError::UnknownTag(other)),
        };

        Ok(Self { expires_at, value })
    }
}

fn word(bytes: &[u8], kind: &'static str) -> Result<[u8; 8], DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::PayloadLength {
        kind,
        len: bytes.len(),
    })
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
