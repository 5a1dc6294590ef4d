//! Memoized validation results
//!
//! [`CachedValidator`] wraps any [`DriftValidator`] with a bounded LRU table.
//! Entries are keyed by `(query tokens, dialect, schema version)`. A schema
//! hot-swap bumps the version, so every later lookup misses the old entries;
//! they are never returned again and age out through normal eviction.

use crate::error::{Error, Result, ValidationResult};
use crate::dialects::query_fingerprint;
use crate::validation::{ColumnValidator, DriftValidator, SchemaValidator};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Cache-augmented table validator
pub type CachedSchemaValidator = CachedValidator<SchemaValidator>;

/// Cache-augmented column validator
pub type CachedColumnValidator = CachedValidator<ColumnValidator>;

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    /// Entries currently held
    pub size: usize,
    /// Capacity
    pub maxsize: usize,
    /// `hits / (hits + misses)`, or 0.0 before the first lookup
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    dialect: Option<String>,
    version: u64,
}

impl CacheKey {
    fn new(sql: &str, dialect: Option<&str>, version: u64) -> Self {
        Self {
            query: query_fingerprint(sql, dialect),
            dialect: dialect.map(|d| d.trim().to_lowercase()),
            version,
        }
    }
}

/// LRU table: entries carry the tick of their last use, `recency` orders ticks.
#[derive(Debug)]
struct LruTable {
    capacity: usize,
    entries: HashMap<CacheKey, (u64, ValidationResult)>,
    recency: BTreeMap<u64, CacheKey>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl LruTable {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            recency: BTreeMap::new(),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, key: &CacheKey) -> Option<ValidationResult> {
        let tick = self.next_tick();
        match self.entries.get_mut(key) {
            Some((last_used, result)) => {
                self.recency.remove(&*last_used);
                *last_used = tick;
                self.recency.insert(tick, key.clone());
                self.hits += 1;
                Some(result.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, key: CacheKey, result: ValidationResult) {
        let tick = self.next_tick();
        if let Some((previous, _)) = self.entries.insert(key.clone(), (tick, result)) {
            self.recency.remove(&previous);
        }
        self.recency.insert(tick, key);

        while self.entries.len() > self.capacity {
            match self.recency.pop_first() {
                Some((_, oldest)) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.hits = 0;
        self.misses = 0;
    }

    fn info(&self) -> CacheInfo {
        let lookups = self.hits + self.misses;
        CacheInfo {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
            maxsize: self.capacity,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
        }
    }
}

/// A validator with a bounded result cache.
///
/// The cache lock is never held while the wrapped validator runs. Results are
/// stored under the schema version they were computed against, so a result
/// from before a hot-swap cannot be served after it.
///
/// # Example
///
/// ```
/// use sqldrift::{CachedSchemaValidator, SchemaValidator, ValidatorOptions, DEFAULT_CACHE_SIZE};
///
/// let inner = SchemaValidator::new(&["users"], ValidatorOptions::default()).unwrap();
/// let cached = CachedSchemaValidator::new(inner, DEFAULT_CACHE_SIZE).unwrap();
///
/// assert!(!cached.validate("SELECT * FROM orders", None).unwrap().ok);
/// cached.update_schema(vec!["users".to_string(), "orders".to_string()]).unwrap();
/// assert!(cached.validate("SELECT * FROM orders", None).unwrap().ok);
/// ```
pub struct CachedValidator<V> {
    inner: V,
    cache: Mutex<LruTable>,
}

impl<V: DriftValidator> CachedValidator<V> {
    /// Wrap `inner` with a cache of `cache_size` entries; zero is rejected.
    pub fn new(inner: V, cache_size: usize) -> Result<Self> {
        if cache_size == 0 {
            return Err(Error::configuration("cache_size must be at least 1"));
        }
        Ok(Self {
            inner,
            cache: Mutex::new(LruTable::new(cache_size)),
        })
    }

    /// The wrapped validator, for queries such as `table_exists`
    pub fn inner(&self) -> &V {
        &self.inner
    }

    fn table(&self) -> MutexGuard<'_, LruTable> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate `sql`, serving repeated queries from the cache.
    pub fn validate(&self, sql: &str, dialect: Option<&str>) -> Result<ValidationResult> {
        self.validate_versioned(sql, dialect).map(|(_, result)| result)
    }

    /// Replace the wrapped validator's schema; cached results become unreachable.
    pub fn update_schema(&self, schema: V::Schema) -> Result<()> {
        self.inner.update_schema(schema)?;
        debug!(version = self.inner.schema_version(), "cache keyed to new schema version");
        Ok(())
    }

    /// Drop every entry and reset the statistics.
    pub fn clear_cache(&self) {
        self.table().clear();
    }

    pub fn get_cache_info(&self) -> CacheInfo {
        self.table().info()
    }
}

impl<V: DriftValidator> DriftValidator for CachedValidator<V> {
    type Schema = V::Schema;

    fn validate_versioned(&self, sql: &str, dialect: Option<&str>) -> Result<(u64, ValidationResult)> {
        let key = CacheKey::new(sql, dialect, self.inner.schema_version());
        if let Some(result) = self.table().get(&key) {
            debug!(version = key.version, "validation cache hit");
            return Ok((key.version, result));
        }

        let (version, result) = self.inner.validate_versioned(sql, dialect)?;
        debug!(version, "validation cache miss");
        self.table().insert(CacheKey { version, ..key }, result.clone());
        Ok((version, result))
    }

    fn update_schema(&self, schema: V::Schema) -> Result<()> {
        CachedValidator::update_schema(self, schema)
    }

    fn schema_version(&self) -> u64 {
        self.inner.schema_version()
    }
}

impl<V: fmt::Debug> fmt::Debug for CachedValidator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.cache.lock().unwrap_or_else(PoisonError::into_inner).info();
        f.debug_struct("CachedValidator")
            .field("inner", &self.inner)
            .field("cache", &info)
            .finish()
    }
}
