//! File Cache Engine
//!
//! Stores one file per key under a configured directory. File names are
//! the hex SHA-256 of `prefix-key`, so keys never leak filesystem-unsafe
//! characters but cannot be enumerated by prefix either.
//!
//! Expired records are deleted lazily by whichever read discovers them.
//! Same-key read-modify-write sequences are serialised inside this
//! process through lock shards; there is no cross-process atomicity.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::cache::{apply_delta, namespaced, Cache, Record, Step, Value};
use crate::error::{CacheError, Result};

const BACKEND: &str = "file";

/// Number of in-process lock shards, selected by the first digest byte.
const LOCK_SHARDS: usize = 64;

/// Temp files older than this are leftovers from interrupted writes.
const STALE_TEMP_AGE: Duration = Duration::from_secs(600);

// == File Cache ==
/// Filesystem-backed implementation of the [`Cache`] contract.
#[derive(Debug)]
pub struct FileCache {
    /// Namespace isolating this consumer from others sharing `dir`
    prefix: String,
    /// Directory holding one file per key
    dir: PathBuf,
    /// Per-key mutual exclusion, sharded by hashed path
    shards: Vec<Mutex<()>>,
}

/// Resolved on-disk location of a key.
struct Slot {
    path: PathBuf,
    shard: usize,
}

impl FileCache {
    // == Constructor ==
    /// Creates a file cache rooted at `dir`.
    ///
    /// No I/O happens here; the directory is created on first write.
    pub fn new(prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            dir: dir.into(),
            shards: (0..LOCK_SHARDS).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file that holds `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.slot(key).path
    }

    fn slot(&self, key: &str) -> Slot {
        let digest = Sha256::digest(namespaced(&self.prefix, key).as_bytes());
        Slot {
            path: self.dir.join(hex::encode(digest)),
            shard: digest[0] as usize % LOCK_SHARDS,
        }
    }

    fn lock(&self, slot: &Slot) -> MutexGuard<'_, ()> {
        self.lock_shard(slot.shard)
    }

    fn lock_shard(&self, shard: usize) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned shard carries no broken state.
        self.shards[shard]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn io_err(&self, key: &str, source: std::io::Error) -> CacheError {
        CacheError::Io {
            backend: BACKEND,
            key: key.to_string(),
            source,
        }
    }

    // == Read ==
    /// Loads the record for `key`, deleting it if it has expired.
    ///
    /// Callers must hold the shard lock.
    fn read(&self, key: &str, slot: &Slot) -> Result<Option<Record>> {
        let bytes = match fs::read(&slot.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(key = key, "File cache MISS");
                return Ok(None);
            }
            Err(e) => return Err(self.io_err(key, e)),
        };

        let record = Record::decode(&bytes).map_err(|source| CacheError::Codec {
            backend: BACKEND,
            key: key.to_string(),
            source,
        })?;

        if record.is_expired() {
            debug!(key = key, path = %slot.path.display(), "Deleting expired record");
            self.delete(key, slot)?;
            return Ok(None);
        }

        trace!(key = key, "File cache HIT");
        Ok(Some(record))
    }

    // == Write ==
    /// Writes `record` through a temp file renamed into place.
    ///
    /// Callers must hold the shard lock.
    fn write(&self, key: &str, slot: &Slot, record: &Record) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| self.io_err(key, e))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| self.io_err(key, e))?;
        tmp.write_all(&record.encode())
            .map_err(|e| self.io_err(key, e))?;
        tmp.persist(&slot.path)
            .map_err(|e| self.io_err(key, e.error))?;

        debug!(
            key = key,
            path = %slot.path.display(),
            expires_at = record.expires_at,
            "Stored record"
        );
        Ok(())
    }

    fn delete(&self, key: &str, slot: &Slot) -> Result<()> {
        match fs::remove_file(&slot.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(key, e)),
        }
    }

    fn step(&self, key: &str, delta: Value, step: Step) -> Result<Value> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);

        let mut record = self
            .read(key, &slot)?
            .ok_or_else(|| CacheError::not_found(BACKEND, key))?;
        record.value = apply_delta(BACKEND, key, record.value, delta, step)?;
        self.write(key, &slot, &record)?;
        Ok(record.value)
    }

    // == Remove Expired ==
    /// Deletes every expired record in the directory.
    ///
    /// Files that are not cache records are ignored; undecodable records
    /// are logged and left alone. Temp files abandoned by interrupted
    /// writes are removed once they are old enough. Returns the number of
    /// expired records removed.
    pub fn remove_expired(&self) -> Result<usize> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.io_err("*", e)),
        };

        let mut removed = 0;
        for entry in read_dir.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.starts_with(".tmp") {
                remove_if_stale(&path);
                continue;
            }
            let Some(shard) = shard_of_name(name) else {
                continue;
            };
            let _guard = self.lock_shard(shard);

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(self.io_err(name, e)),
            };
            match Record::decode(&bytes) {
                Ok(record) if record.is_expired() => match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(self.io_err(name, e)),
                },
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }

        Ok(removed)
    }
}

fn is_digest_name(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Lock shard of a record file, or `None` if `name` is not a digest.
fn shard_of_name(name: &str) -> Option<usize> {
    if !is_digest_name(name) {
        return None;
    }
    u8::from_str_radix(&name[..2], 16)
        .ok()
        .map(|b| b as usize % LOCK_SHARDS)
}

fn remove_if_stale(path: &Path) {
    let age = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());

    if matches!(age, Some(age) if age >= STALE_TEMP_AGE) {
        debug!(path = %path.display(), "Removing stale temp file");
        let _ = fs::remove_file(path);
    }
}

impl Cache for FileCache {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);
        self.write(key, &slot, &Record::new(value, ttl))
    }

    fn put_forever(&self, key: &str, value: Value) -> Result<()> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);
        self.write(key, &slot, &Record::forever(value))
    }

    fn set(&self, key: &str, value: Value) -> Result<bool> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);

        match self.read(key, &slot)? {
            Some(mut record) => {
                record.value = value;
                self.write(key, &slot, &record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);
        Ok(self.read(key, &slot)?.map(|record| record.value))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);
        Ok(self.read(key, &slot)?.is_some())
    }

    fn forget(&self, key: &str) -> Result<()> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);
        self.delete(key, &slot)
    }

    fn pull(&self, key: &str) -> Result<Option<Value>> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);

        let record = self.read(key, &slot)?;
        if record.is_some() {
            self.delete(key, &slot)?;
        }
        Ok(record.map(|record| record.value))
    }

    fn ttl(&self, key: &str) -> Result<Duration> {
        let slot = self.slot(key);
        let _guard = self.lock(&slot);

        self.read(key, &slot)?
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

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheExt, DecodeError};
    use std::thread::sleep;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache_in(dir: &TempDir) -> FileCache {
        FileCache::new("test", dir.path())
    }

    #[test]
    fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("name", Value::from("John"), HOUR).unwrap();

        assert_eq!(cache.get("name").unwrap(), Some(Value::from("John")));
        assert!(cache.exists("name").unwrap());
        assert_eq!(cache.get_string("name").unwrap(), "John");
    }

    #[test]
    fn test_get_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        assert_eq!(cache.get("missing").unwrap(), None);
        assert!(!cache.exists("missing").unwrap());
        assert!(cache.ttl("missing").unwrap_err().is_not_found());
        assert!(cache.get_i64("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_directory_created_on_first_write() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let cache = FileCache::new("test", &nested);

        assert!(!nested.exists());
        cache.put("k", Value::from(1), HOUR).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_file_name_is_hex_digest() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        let path = cache.path_for("user/../../etc:passwd");
        assert_eq!(path.parent().unwrap(), dir.path());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(is_digest_name(name));
        assert_eq!(cache.path_for("user/../../etc:passwd"), path);
    }

    #[test]
    fn test_expired_entry_is_deleted_on_access() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache
            .put("short", Value::from("v"), Duration::from_millis(10))
            .unwrap();
        let path = cache.path_for("short");
        assert!(path.exists());

        sleep(Duration::from_millis(20));

        assert_eq!(cache.get("short").unwrap(), None);
        assert!(!path.exists(), "expired record should be removed from disk");
        assert!(!cache.exists("short").unwrap());
    }

    #[test]
    fn test_put_forever_ttl_is_unbounded() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put_forever("pinned", Value::from(1)).unwrap();

        let ttl = cache.ttl("pinned").unwrap();
        assert!(ttl > Duration::from_secs(60 * 60 * 24 * 365 * 1000));
    }

    #[test]
    fn test_set_does_not_create() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        assert!(!cache.set("ghost", Value::from(1)).unwrap());
        assert!(!cache.path_for("ghost").exists());
        assert_eq!(cache.get("ghost").unwrap(), None);
    }

    #[test]
    fn test_set_preserves_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("k", Value::from("v1"), HOUR).unwrap();
        let before = cache.ttl("k").unwrap();

        assert!(cache.set("k", Value::from("v2")).unwrap());

        let after = cache.ttl("k").unwrap();
        assert!(after <= before);
        assert!(before - after < Duration::from_secs(5));
        assert_eq!(cache.get_string("k").unwrap(), "v2");
    }

    #[test]
    fn test_increment_and_decrement() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("n", Value::from(5), HOUR).unwrap();
        assert_eq!(cache.increment("n").unwrap(), Value::Int(6));
        assert_eq!(cache.get("n").unwrap(), Some(Value::Int(6)));

        assert_eq!(cache.decrement_by("n", Value::from(3)).unwrap(), Value::Int(3));
        assert_eq!(cache.get_i64("n").unwrap(), 3);
    }

    #[test]
    fn test_increment_float() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("f", Value::from(1.5), HOUR).unwrap();
        cache.increment_by("f", Value::from(0.25)).unwrap();
        assert_eq!(cache.get("f").unwrap(), Some(Value::Float(1.75)));

        // An integer delta on a float entry truncates to integer arithmetic.
        cache.increment("f").unwrap();
        assert_eq!(cache.get("f").unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn test_increment_missing_fails() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        assert!(cache.increment("nope").unwrap_err().is_not_found());
        assert!(cache.decrement("nope").unwrap_err().is_not_found());
        assert_eq!(cache.get("nope").unwrap(), None);
    }

    #[test]
    fn test_increment_non_numeric_fails() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("s", Value::from("abc"), HOUR).unwrap();
        let err = cache.increment("s").unwrap_err();
        assert!(matches!(err, CacheError::Cast { .. }));
        assert_eq!(cache.get_string("s").unwrap(), "abc");
    }

    #[test]
    fn test_increment_preserves_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.put("n", Value::from(1), Duration::from_secs(30)).unwrap();
        cache.increment("n").unwrap();
        assert!(cache.ttl("n").unwrap() <= Duration::from_secs(30));
    }

    #[test]
    fn test_forget_and_pull() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.forget("never-there").unwrap();

        cache.put("k", Value::from(true), HOUR).unwrap();
        assert_eq!(cache.pull("k").unwrap(), Some(Value::Bool(true)));
        assert_eq!(cache.pull("k").unwrap(), None);
        assert!(!cache.path_for("k").exists());
    }

    #[test]
    fn test_corrupt_record_is_codec_error() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        fs::write(cache.path_for("bad"), b"not a cache record").unwrap();

        let err = cache.get("bad").unwrap_err();
        assert!(matches!(
            err,
            CacheError::Codec {
                source: DecodeError::BadMagic,
                ..
            }
        ));
        assert_eq!(cache.i64_or("bad", 7), 7);
    }

    #[test]
    fn test_short_record_is_truncated() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        fs::write(cache.path_for("short"), b"CGR").unwrap();

        let err = cache.get("short").unwrap_err();
        assert!(matches!(
            err,
            CacheError::Codec {
                source: DecodeError::Truncated(3),
                ..
            }
        ));
    }

    #[test]
    fn test_io_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let cache = FileCache::new("test", &blocker);

        let err = cache.put("k", Value::from(1), HOUR).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[test]
    fn test_prefixes_are_isolated() {
        let dir = TempDir::new().unwrap();
        let a = FileCache::new("a", dir.path());
        let b = FileCache::new("b", dir.path());

        a.put("shared", Value::from("from a"), HOUR).unwrap();

        assert_eq!(b.get("shared").unwrap(), None);
        b.put("shared", Value::from("from b"), HOUR).unwrap();
        assert_eq!(a.get_string("shared").unwrap(), "from a");
        assert_eq!(b.get_string("shared").unwrap(), "from b");
    }

    #[test]
    fn test_remove_expired() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache
            .put("old", Value::from(1), Duration::from_millis(10))
            .unwrap();
        cache.put("fresh", Value::from(2), HOUR).unwrap();
        fs::write(dir.path().join("README"), b"unrelated").unwrap();
        fs::write(dir.path().join("a".repeat(64)), b"garbage").unwrap();

        sleep(Duration::from_millis(20));

        assert_eq!(cache.remove_expired().unwrap(), 1);
        assert!(!cache.path_for("old").exists());
        assert!(cache.exists("fresh").unwrap());
        assert!(dir.path().join("README").exists());
        assert!(dir.path().join("a".repeat(64)).exists());
    }

    #[test]
    fn test_remove_expired_missing_dir() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new("test", dir.path().join("absent"));
        assert_eq!(cache.remove_expired().unwrap(), 0);
    }
}
