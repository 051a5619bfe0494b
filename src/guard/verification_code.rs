//! Verification Code Issuer
//!
//! Short-lived numeric codes stored under one cache key. The entry is
//! created empty with a fixed TTL; generating a code rewrites the value
//! but never extends that TTL.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::cache::{Cache, CacheExt, Value};
use crate::error::{CacheError, Result};

/// Characters a generated code is drawn from.
pub const CODE_CHARSET: &[u8] = b"0123456789";

/// Length used by [`VerificationCode::generate`].
pub const DEFAULT_CODE_LENGTH: usize = 5;

// == Verification Code ==
/// One-time code bound to one cache key.
#[derive(Clone)]
pub struct VerificationCode {
    cache: Arc<dyn Cache>,
    key: String,
    ttl: Duration,
}

impl std::fmt::Debug for VerificationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationCode")
            .field("backend", &self.cache.name())
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl VerificationCode {
    // == Constructor ==
    /// Binds an issuer to `key`, creating an empty entry if none exists.
    ///
    /// An existing entry keeps both its value and its remaining TTL.
    pub fn new(cache: Arc<dyn Cache>, key: impl Into<String>, ttl: Duration) -> Result<Self> {
        let code = Self {
            cache,
            key: key.into(),
            ttl,
        };

        if !code.cache.exists(&code.key)? {
            code.cache.put(&code.key, Value::from(""), ttl)?;
        }

        Ok(code)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Generate ==
    /// Generates and stores a code of [`DEFAULT_CODE_LENGTH`] digits.
    pub fn generate(&self) -> Result<String> {
        self.generate_n(DEFAULT_CODE_LENGTH)
    }

    /// Generates and stores a code of `length` digits.
    ///
    /// Digits come from the thread-local CSPRNG.
    pub fn generate_n(&self, length: usize) -> Result<String> {
        if length == 0 {
            return Err(CacheError::InvalidRequest(
                "verification code length must be positive".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        let code: String = (0..length)
            .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
            .collect();

        self.set(&code)?;
        debug!(key = %self.key, length = length, "Generated verification code");
        Ok(code)
    }

    // == Set ==
    /// Stores a caller-chosen code, keeping the entry's TTL.
    pub fn set(&self, code: &str) -> Result<()> {
        if self.cache.set(&self.key, Value::from(code))? {
            Ok(())
        } else {
            Err(CacheError::not_found(self.cache.name(), &self.key))
        }
    }

    // == Get ==
    /// Returns the stored code.
    ///
    /// An empty string means the entry exists but no code was generated
    /// yet; a missing or expired entry is `NotFound`.
    pub fn get(&self) -> Result<String> {
        self.cache.get_string(&self.key)
    }

    // == Clear ==
    /// Deletes the entry outright.
    pub fn clear(&self) -> Result<()> {
        self.cache.forget(&self.key)
    }

    pub fn exists(&self) -> Result<bool> {
        self.cache.exists(&self.key)
    }

    /// Time until the code stops being valid.
    pub fn expires_in(&self) -> Result<Duration> {
        self.cache.ttl(&self.key)
    }
}
