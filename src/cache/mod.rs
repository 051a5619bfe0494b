//! Cache Module
//!
//! The storage-backend contract shared by every engine, plus the file and
//! memory engines that implement it.
//!
//! Semantics every backend must honour:
//! - `put` and `put_forever` create or overwrite unconditionally.
//! - `set` only updates an existing, unexpired entry and keeps its expiry.
//! - `get` reports absent or expired entries as `None`, deleting expired
//!   ones on the way.
//! - `increment_by`/`decrement_by` never create an entry.

mod file;
mod memory;
mod record;
mod value;

#[cfg(test)]
mod property_tests;

use std::time::Duration;

use crate::error::{CacheError, Result};

// Re-export public types
pub use file::FileCache;
pub use memory::MemoryCache;
pub use record::{current_timestamp_ms, DecodeError, Record, FOREVER};
pub use value::{CastError, FromValue, Value};

/// Separator placed between a backend prefix and a logical key.
pub const PREFIX_SEPARATOR: &str = "-";

// == Cache Contract ==
/// Uniform key-value contract implemented by every storage backend.
///
/// The trait is object safe; stateful primitives hold an
/// `Arc<dyn Cache>` and never see the concrete engine.
pub trait Cache: Send + Sync {
    /// Backend identity used in error context.
    fn name(&self) -> &'static str;

    /// Stores `value`, replacing any existing entry, expiring after `ttl`.
    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Stores `value` with an expiry no clock will reach.
    fn put_forever(&self, key: &str, value: Value) -> Result<()>;

    /// Replaces the value of an existing entry, keeping its expiry.
    ///
    /// Returns `Ok(false)` without writing when the key is absent.
    fn set(&self, key: &str, value: Value) -> Result<bool>;

    /// Returns the stored value, or `None` when absent or expired.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// True iff an unexpired entry is present.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Deletes the entry. Absent keys are not an error.
    fn forget(&self, key: &str) -> Result<()>;

    /// Remaining time to expiry. Fails with `NotFound` when absent.
    fn ttl(&self, key: &str) -> Result<Duration>;

    /// Returns the stored value and deletes the entry.
    fn pull(&self, key: &str) -> Result<Option<Value>> {
        let value = self.get(key)?;
        if value.is_some() {
            self.forget(key)?;
        }
        Ok(value)
    }

    /// Adds `delta` to a numeric entry, keeping its expiry, and returns
    /// the value written.
    ///
    /// A `Float` delta switches to floating arithmetic; anything else is
    /// coerced to `i64`. Fails with `NotFound` when the key is absent.
    /// Backends with a native atomic increment should override this.
    fn increment_by(&self, key: &str, delta: Value) -> Result<Value> {
        let current = self.get(key)?.ok_or_else(|| CacheError::not_found(self.name(), key))?;
        let next = apply_delta(self.name(), key, current, delta, Step::Add)?;
        if self.set(key, next.clone())? {
            Ok(next)
        } else {
            Err(CacheError::not_found(self.name(), key))
        }
    }

    fn increment(&self, key: &str) -> Result<Value> {
        self.increment_by(key, Value::Int(1))
    }

    /// Subtracts `delta` from a numeric entry; see [`Cache::increment_by`].
    fn decrement_by(&self, key: &str, delta: Value) -> Result<Value> {
        let current = self.get(key)?.ok_or_else(|| CacheError::not_found(self.name(), key))?;
        let next = apply_delta(self.name(), key, current, delta, Step::Sub)?;
        if self.set(key, next.clone())? {
            Ok(next)
        } else {
            Err(CacheError::not_found(self.name(), key))
        }
    }

    fn decrement(&self, key: &str) -> Result<Value> {
        self.decrement_by(key, Value::Int(1))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Add,
    Sub,
}

impl Step {
    fn symbol(self) -> &'static str {
        match self {
            Step::Add => "+",
            Step::Sub => "-",
        }
    }
}

/// Computes the value an increment or decrement writes back.
pub(crate) fn apply_delta(
    backend: &'static str,
    key: &str,
    current: Value,
    delta: Value,
    step: Step,
) -> Result<Value> {
    let cast = |source: CastError| CacheError::Cast {
        backend,
        key: key.to_string(),
        source,
    };

    if delta.is_float() {
        let base = f64::from_value(current).map_err(cast)?;
        let by = f64::from_value(delta).map_err(cast)?;
        return Ok(Value::Float(match step {
            Step::Add => base + by,
            Step::Sub => base - by,
        }));
    }

    let base = i64::from_value(current).map_err(cast)?;
    let by = i64::from_value(delta).map_err(cast)?;
    let next = match step {
        Step::Add => base.checked_add(by),
        Step::Sub => base.checked_sub(by),
    };
    next.map(Value::Int).ok_or_else(|| {
        cast(CastError::OutOfRange {
            value: format!("{} {} {}", base, step.symbol(), by),
            to: "i64",
        })
    })
}

// == Typed Accessors ==
/// Typed reads layered on any [`Cache`], including `dyn Cache`.
///
/// The strict `get_*` forms fail with `NotFound` on absence and `Cast` on
/// coercion failure. The `*_or` forms return the fallback on any failure
/// and are only ever used for reads.
pub trait CacheExt: Cache {
    fn get_as<T: FromValue>(&self, key: &str) -> Result<T> {
        let value = self
            .get(key)?
            .ok_or_else(|| CacheError::not_found(self.name(), key))?;
        T::from_value(value).map_err(|source| CacheError::Cast {
            backend: self.name(),
            key: key.to_string(),
            source,
        })
    }

    fn get_or<T: FromValue>(&self, key: &str, fallback: T) -> T {
        self.get_as(key).unwrap_or(fallback)
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        self.get_as(key)
    }

    fn bool_or(&self, key: &str, fallback: bool) -> bool {
        self.get_or(key, fallback)
    }

    fn get_int(&self, key: &str) -> Result<isize> {
        self.get_as(key)
    }

    fn int_or(&self, key: &str, fallback: isize) -> isize {
        self.get_or(key, fallback)
    }

    fn get_i8(&self, key: &str) -> Result<i8> {
        self.get_as(key)
    }

    fn i8_or(&self, key: &str, fallback: i8) -> i8 {
        self.get_or(key, fallback)
    }

    fn get_i16(&self, key: &str) -> Result<i16> {
        self.get_as(key)
    }

    fn i16_or(&self, key: &str, fallback: i16) -> i16 {
        self.get_or(key, fallback)
    }

    fn get_i32(&self, key: &str) -> Result<i32> {
        self.get_as(key)
    }

    fn i32_or(&self, key: &str, fallback: i32) -> i32 {
        self.get_or(key, fallback)
    }

    fn get_i64(&self, key: &str) -> Result<i64> {
        self.get_as(key)
    }

    fn i64_or(&self, key: &str, fallback: i64) -> i64 {
        self.get_or(key, fallback)
    }

    fn get_uint(&self, key: &str) -> Result<usize> {
        self.get_as(key)
    }

    fn uint_or(&self, key: &str, fallback: usize) -> usize {
        self.get_or(key, fallback)
    }

    fn get_u8(&self, key: &str) -> Result<u8> {
        self.get_as(key)
    }

    fn u8_or(&self, key: &str, fallback: u8) -> u8 {
        self.get_or(key, fallback)
    }

    fn get_u16(&self, key: &str) -> Result<u16> {
        self.get_as(key)
    }

    fn u16_or(&self, key: &str, fallback: u16) -> u16 {
        self.get_or(key, fallback)
    }

    fn get_u32(&self, key: &str) -> Result<u32> {
        self.get_as(key)
    }

    fn u32_or(&self, key: &str, fallback: u32) -> u32 {
        self.get_or(key, fallback)
    }

    fn get_u64(&self, key: &str) -> Result<u64> {
        self.get_as(key)
    }

    fn u64_or(&self, key: &str, fallback: u64) -> u64 {
        self.get_or(key, fallback)
    }

    fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_as(key)
    }

    fn f64_or(&self, key: &str, fallback: f64) -> f64 {
        self.get_or(key, fallback)
    }

    fn get_string(&self, key: &str) -> Result<String> {
        self.get_as(key)
    }

    fn string_or(&self, key: &str, fallback: &str) -> String {
        self.get_as(key).unwrap_or_else(|_| fallback.to_string())
    }

    fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.get_as(key)
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Joins a prefix and a logical key into the namespaced key.
pub(crate) fn namespaced(prefix: &str, key: &str) -> String {
    format!("{}{}{}", prefix, PREFIX_SEPARATOR, key)
}
