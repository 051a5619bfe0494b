//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check both engines against a plain map model and to
//! exercise the record codec with arbitrary input.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

use crate::cache::{Cache, CacheExt, FileCache, MemoryCache, Record, Value};

const HOUR: Duration = Duration::from_secs(3600);

// == Strategies ==
/// Generates cache keys, including characters that are unsafe in paths
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:/. -]{1,48}"
}

/// Generates values of every variant. Floats stay finite so equality holds.
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::UInt),
        (-1.0e12f64..1.0e12).prop_map(Value::Float),
        ".{0,64}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: Value },
    Set { key: String, value: Value },
    Get { key: String },
    Forget { key: String },
    Pull { key: String },
}

/// Operations over a small key space so they collide often
fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let key = "[a-d]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Forget { key }),
        key.prop_map(|key| CacheOp::Pull { key }),
    ]
}

/// Replays `ops` against `cache` and a map model, comparing every answer.
fn check_against_model(cache: &dyn Cache, ops: Vec<CacheOp>) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, Value> = HashMap::new();

    for op in ops {
        match op {
            CacheOp::Put { key, value } => {
                cache.put(&key, value.clone(), HOUR).unwrap();
                model.insert(key, value);
            }
            CacheOp::Set { key, value } => {
                let updated = cache.set(&key, value.clone()).unwrap();
                prop_assert_eq!(updated, model.contains_key(&key), "set on {}", key);
                if let Some(slot) = model.get_mut(&key) {
                    *slot = value;
                }
            }
            CacheOp::Get { key } => {
                prop_assert_eq!(cache.get(&key).unwrap(), model.get(&key).cloned());
            }
            CacheOp::Forget { key } => {
                cache.forget(&key).unwrap();
                model.remove(&key);
            }
            CacheOp::Pull { key } => {
                prop_assert_eq!(cache.pull(&key).unwrap(), model.remove(&key));
            }
        }
    }

    for (key, value) in &model {
        prop_assert!(cache.exists(key).unwrap());
        let stored = cache.get(key).unwrap();
        prop_assert_eq!(stored.as_ref(), Some(value));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any value survives encode/decode unchanged.
    #[test]
    fn prop_record_roundtrip(value in value_strategy()) {
        let record = Record::new(value, HOUR);
        let decoded = Record::decode(&record.encode()).unwrap();
        prop_assert_eq!(decoded, record);
    }

    // Decoding arbitrary bytes fails cleanly instead of panicking.
    #[test]
    fn prop_decode_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = Record::decode(&bytes);
    }

    // Stored values read back identically from the memory engine.
    #[test]
    fn prop_memory_roundtrip(key in key_strategy(), value in value_strategy()) {
        let cache = MemoryCache::new("prop");
        cache.put(&key, value.clone(), HOUR).unwrap();
        prop_assert_eq!(cache.get(&key).unwrap(), Some(value));
    }

    // `set` never creates an entry.
    #[test]
    fn prop_set_without_create(key in key_strategy(), value in value_strategy()) {
        let cache = MemoryCache::new("prop");
        prop_assert!(!cache.set(&key, value).unwrap());
        prop_assert!(!cache.exists(&key).unwrap());
    }

    // The memory engine behaves like a map for any operation sequence.
    #[test]
    fn prop_memory_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache = MemoryCache::new("prop");
        check_against_model(&cache, ops)?;
    }

    // Increments of integers sum exactly.
    #[test]
    fn prop_increment_sums(
        start in any::<i32>(),
        deltas in prop::collection::vec(any::<i32>(), 1..20)
    ) {
        let cache = MemoryCache::new("prop");
        cache.put_forever("counter", Value::from(start)).unwrap();

        let mut expected = start as i64;
        for delta in deltas {
            cache.increment_by("counter", Value::from(delta)).unwrap();
            expected += delta as i64;
        }

        prop_assert_eq!(cache.get_i64("counter").unwrap(), expected);
    }

    // Increment then decrement by the same amount is a no-op.
    #[test]
    fn prop_increment_decrement_cancel(start in any::<i32>(), delta in any::<i32>()) {
        let cache = MemoryCache::new("prop");
        cache.put_forever("counter", Value::from(start)).unwrap();

        cache.increment_by("counter", Value::from(delta)).unwrap();
        cache.decrement_by("counter", Value::from(delta)).unwrap();

        prop_assert_eq!(cache.get_i64("counter").unwrap(), start as i64);
    }
}

// Separate block with fewer cases for tests that touch the disk
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // The file engine behaves like a map for any operation sequence.
    #[test]
    fn prop_file_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..30)) {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new("prop", dir.path());
        check_against_model(&cache, ops)?;
    }

    // Two prefixes over one directory never see each other's entries.
    #[test]
    fn prop_prefix_isolation(
        key in key_strategy(),
        a in value_strategy(),
        b in value_strategy()
    ) {
        let dir = TempDir::new().unwrap();
        let first = FileCache::new("first", dir.path());
        let second = FileCache::new("second", dir.path());

        first.put(&key, a.clone(), HOUR).unwrap();
        prop_assert!(!second.exists(&key).unwrap());

        second.put(&key, b.clone(), HOUR).unwrap();
        prop_assert_eq!(first.get(&key).unwrap(), Some(a));
        prop_assert_eq!(second.get(&key).unwrap(), Some(b));

        prop_assert_ne!(first.path_for(&key), second.path_for(&key));
    }

    // A file-stored value reads back identically.
    #[test]
    fn prop_file_roundtrip(key in key_strategy(), value in value_strategy()) {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new("prop", dir.path());
        cache.put(&key, value.clone(), HOUR).unwrap();
        prop_assert_eq!(cache.get(&key).unwrap(), Some(value));
    }
}
