//! Concurrency Tests
//!
//! Validators are shared across threads while the live schema is hot-swapped.
//! Every verdict must match one of the schemas that was live during the call,
//! and once a swap returns no thread may observe the old schema again.

mod common;

use common::{LIVE_TABLES, SHOP_SCHEMA};
use sqldrift::{
    CachedColumnValidator, CachedSchemaValidator, ColumnSet, ColumnValidator, DriftValidator,
    SchemaValidator, ValidatorOptions,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const READERS: usize = 4;
const SWAPS: usize = 50;

#[test]
fn test_concurrent_validation_with_hot_swaps() {
    let inner = SchemaValidator::new(LIVE_TABLES, ValidatorOptions::default()).unwrap();
    let cached = Arc::new(CachedSchemaValidator::new(inner, 16).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let cached = Arc::clone(&cached);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checked = 0usize;
                while !done.load(Ordering::Acquire) || checked == 0 {
                    let (version, result) = cached
                        .validate_versioned("SELECT * FROM users JOIN audit ON true", None)
                        .unwrap();
                    // odd versions have `audit`, even versions do not
                    assert_eq!(result.ok, version % 2 == 1, "version {}: {}", version, result.message);
                    checked += 1;
                }
                checked
            })
        })
        .collect();

    for swap in 1..=SWAPS {
        let mut tables: Vec<String> = LIVE_TABLES.iter().map(|t| t.to_string()).collect();
        if swap % 2 == 1 {
            tables.push("audit".to_string());
        }
        cached.update_schema(tables).unwrap();
        assert_eq!(cached.schema_version(), swap as u64);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    // SWAPS is even: `audit` is gone in the final schema
    let result = cached.validate("SELECT * FROM users JOIN audit ON true", None).unwrap();
    assert_eq!(result.missing_names(), vec!["audit"]);
}

#[test]
fn test_update_visible_to_all_threads_after_return() {
    let validator = Arc::new(ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap());
    assert!(!validator.validate("SELECT tier FROM users", None).unwrap().ok);

    let mut schema = (*SHOP_SCHEMA).clone();
    schema.insert("users", ColumnSet::new(["id", "name", "email", "created_at", "tier"]));
    validator.update_schema(&schema).unwrap();

    thread::scope(|scope| {
        for _ in 0..READERS {
            let validator = Arc::clone(&validator);
            scope.spawn(move || {
                let result = validator.validate("SELECT tier FROM users", None).unwrap();
                assert!(result.ok, "{}", result.message);
            });
        }
    });
}

#[test]
fn test_shared_cache_counts_every_lookup() {
    let inner = ColumnValidator::new(&SHOP_SCHEMA, ValidatorOptions::default()).unwrap();
    let cached = Arc::new(CachedColumnValidator::new(inner, 8).unwrap());
    let per_thread = 25;

    thread::scope(|scope| {
        for _ in 0..READERS {
            let cached = Arc::clone(&cached);
            scope.spawn(move || {
                for _ in 0..per_thread {
                    assert!(cached.validate("SELECT name FROM users", None).unwrap().ok);
                }
            });
        }
    });

    let info = cached.get_cache_info();
    assert_eq!(info.hits + info.misses, (READERS * per_thread) as u64);
    assert!(info.misses >= 1);
    assert_eq!(info.size, 1);
}
