//! Rate Limiter
//!
//! Tracks a bounded attempt budget inside a TTL window. The only state is
//! one integer entry holding the attempts remaining.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{Cache, CacheExt, Value};
use crate::error::{CacheError, Result};

// == Rate Limiter ==
/// Attempt budget bound to one cache key.
///
/// State moves Unarmed (no entry) -> Armed (remaining > 0) -> Exhausted
/// (remaining <= 0). Only [`RateLimiter::reset`] restores the budget.
#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    key: String,
    max: u32,
    window: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.cache.name())
            .field("key", &self.key)
            .field("max", &self.max)
            .field("window", &self.window)
            .finish()
    }
}

impl RateLimiter {
    // == Constructor ==
    /// Binds a limiter to `key`, arming it if no entry exists.
    ///
    /// An existing entry is left untouched, so a limiter can be resumed
    /// across process restarts without resetting its window.
    pub fn new(
        cache: Arc<dyn Cache>,
        key: impl Into<String>,
        max: u32,
        window: Duration,
    ) -> Result<Self> {
        let limiter = Self {
            cache,
            key: key.into(),
            max,
            window,
        };

        if !limiter.cache.exists(&limiter.key)? {
            limiter
                .cache
                .put(&limiter.key, Value::from(max), window)?;
            debug!(key = %limiter.key, max = max, "Armed rate limiter");
        }

        Ok(limiter)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_attempts(&self) -> u32 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn remaining(&self) -> Result<i64> {
        self.cache.get_i64(&self.key)
    }

    // == Hit ==
    /// Consumes one attempt.
    ///
    /// The decrement comes first and the answer is decided on the value
    /// it returned, so concurrent hits on one backend never admit more
    /// than `max` attempts. An overdrawn budget is written back as zero.
    ///
    /// Fails with `Exhausted` when no attempts are left and with
    /// `NotFound` when the window has expired or the entry was removed.
    pub fn hit(&self) -> Result<()> {
        match self.cache.decrement(&self.key)? {
            Value::Int(left) if left >= 0 => Ok(()),
            _ => {
                self.cache.set(&self.key, Value::Int(0))?;
                debug!(key = %self.key, "Rate limiter exhausted");
                Err(CacheError::Exhausted {
                    key: self.key.clone(),
                })
            }
        }
    }

    // == Lock ==
    /// Forces the budget to zero without touching the window.
    pub fn lock(&self) -> Result<()> {
        if self.cache.set(&self.key, Value::Int(0))? {
            debug!(key = %self.key, "Locked rate limiter");
            Ok(())
        } else {
            Err(CacheError::not_found(self.cache.name(), &self.key))
        }
    }

    // == Reset ==
    /// Restores the full budget and starts a fresh window.
    pub fn reset(&self) -> Result<()> {
        self.cache
            .put(&self.key, Value::from(self.max), self.window)
    }

    // == Clear ==
    /// Deletes the entry, returning the limiter to Unarmed.
    pub fn clear(&self) -> Result<()> {
        self.cache.forget(&self.key)
    }

    /// True when no attempts are left.
    pub fn must_lock(&self) -> Result<bool> {
        Ok(self.remaining()? <= 0)
    }

    /// Attempts consumed in the current window.
    pub fn total_attempts(&self) -> Result<u32> {
        let remaining = self.remaining()?.clamp(0, self.max as i64) as u32;
        Ok(self.max - remaining)
    }

    /// Attempts still available in the current window.
    pub fn retries_left(&self) -> Result<u32> {
        let remaining = self.remaining()?.max(0);
        Ok(u32::try_from(remaining).unwrap_or(u32::MAX))
    }

    /// Time until the window ends and the entry disappears.
    pub fn available_in(&self) -> Result<Duration> {
        self.cache.ttl(&self.key)
    }
}
