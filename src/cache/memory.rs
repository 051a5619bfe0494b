//! Memory Cache Engine
//!
//! In-process implementation of the cache contract: a HashMap of records
//! behind a mutex, with the same lazy expiry as the file engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::cache::{apply_delta, namespaced, Cache, Record, Step, Value};
use crate::error::{CacheError, Result};

const BACKEND: &str = "memory";

type Entries = HashMap<String, Record>;

// == Memory Cache ==
/// Memory-backed implementation of the [`Cache`] contract.
///
/// Cloning yields another handle onto the same map and prefix.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    /// Namespace isolating this consumer from others sharing the map
    prefix: String,
    /// Records keyed by `prefix-key`
    entries: Arc<Mutex<Entries>>,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates an empty memory cache.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns a view over the same storage under a different prefix.
    pub fn shared_with(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Arc::clone(&self.entries),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn entries(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries.lock().map_err(|_| CacheError::Backend {
            backend: BACKEND,
            message: "entry map lock poisoned".to_string(),
        })
    }

    /// Looks up a live record, removing it if it has expired.
    fn live<'a>(entries: &'a mut Entries, id: &str) -> Option<&'a mut Record> {
        if entries.get(id).is_some_and(Record::is_expired) {
            debug!(key = id, "Deleting expired record");
            entries.remove(id);
            return None;
        }
        entries.get_mut(id)
    }

    fn step(&self, key: &str, delta: Value, step: Step) -> Result<Value> {
        let id = namespaced(&self.prefix, key);
        let mut entries = self.entries()?;

        let record = Self::live(&mut entries, &id)
            .ok_or_else(|| CacheError::not_found(BACKEND, key))?;
        let current = record.value.clone();
        record.value = apply_delta(BACKEND, key, current, delta, step)?;
        Ok(record.value.clone())
    }

    // == Remove Expired ==
    /// Removes all expired records across every prefix sharing this map.
    ///
    /// Returns the number of records removed.
    pub fn remove_expired(&self) -> Result<usize> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired());
        Ok(before - entries.len())
    }

    // == Length ==
    /// Number of stored records, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.entries()?
            .insert(namespaced(&self.prefix, key), Record::new(value, ttl));
        Ok(())
    }

    fn put_forever(&self, key: &str, value: Value) -> Result<()> {
        self.entries()?
            .insert(namespaced(&self.prefix, key), Record::forever(value));
        Ok(())
    }

    fn set(&self, key: &str, value: Value) -> Result<bool> {
        let id = namespaced(&self.prefix, key);
        let mut entries = self.entries()?;

        match Self::live(&mut entries, &id) {
            Some(record) => {
                record.value = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let id = namespaced(&self.prefix, key);
        let mut entries = self.entries()?;
        Ok(Self::live(&mut entries, &id).map(|record| record.value.clone()))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let id = namespaced(&self.prefix, key);
        let mut entries = self.entries()?;
        Ok(Self::live(&mut entries, &id).is_some())
    }

    fn forget(&self, key: &str) -> Result<()> {
        self.entries()?.remove(&namespaced(&self.prefix, key));
        Ok(())
    }

    fn pull(&self, key: &str) -> Result<Option<Value>> {
        let id = namespaced(&self.prefix, key);
        let mut entries = self.entries()?;

        if Self::live(&mut entries, &id).is_none() {
            return Ok(None);
        }
        Ok(entries.remove(&id).map(|record| record.value))
    }

    fn ttl(&self, key: &str) -> Result<Duration> {
        let id = namespaced(&self.prefix, key);
        let mut entries = self.entries()?;

        Self::live(&mut entries, &id)
            .map(|record| record.remaining())
            .ok_or_else(|| CacheError::not_found(BACKEND, key))
    }

    fn increment_by(&self, key: &str, delta: Value) -> Result<Value> {
        self.step(key, delta, Step::Add)
    }

    fn decrement_by(&self, key: &str, delta: Value) -> Result<Value> {
        self.step(key, delta, Step::Sub)
    }
}
