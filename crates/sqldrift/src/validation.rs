//! Schema drift validation
//!
//! Two validators share one call shape:
//! - [`SchemaValidator`] checks that every physical table a query touches exists
//! - [`ColumnValidator`] additionally resolves every column reference to its
//!   owning table and checks the table's column set
//!
//! Both hold their live schema in an immutable snapshot behind
//! `RwLock<Arc<_>>`. A validation call clones the `Arc` and then runs without
//! holding any lock; a hot-swap builds the new snapshot first and replaces it,
//! together with the bumped schema version, in one write.

mod columns;
mod tables;

pub use columns::ColumnValidator;
pub use tables::SchemaValidator;

use crate::error::{Error, Result, ValidationResult};
use crate::schema::{normalize_parts, NormalizedName, SchemaDescription, ValidatorOptions};
use crate::scope::ScopeTree;
use std::sync::{Arc, PoisonError, RwLock};

/// Common surface of every drift validator.
///
/// Implementations must be safe to share between threads; `validate` takes
/// `&self` and may run concurrently with `update_schema`.
pub trait DriftValidator: Send + Sync {
    /// Live schema description accepted by `update_schema`
    type Schema;

    /// Validate `sql` and report the schema version the verdict was computed against.
    fn validate_versioned(&self, sql: &str, dialect: Option<&str>) -> Result<(u64, ValidationResult)>;

    /// Validate `sql` against the current live schema.
    fn validate(&self, sql: &str, dialect: Option<&str>) -> Result<ValidationResult> {
        self.validate_versioned(sql, dialect).map(|(_, result)| result)
    }

    /// Replace the live schema. The schema version increases by one on success.
    fn update_schema(&self, schema: Self::Schema) -> Result<()>;

    /// Version of the live schema; starts at 0
    fn schema_version(&self) -> u64;
}

/// A table-level or column-level validator chosen from a schema description.
#[derive(Debug)]
pub enum Validator {
    Tables(SchemaValidator),
    Columns(ColumnValidator),
}

impl Validator {
    /// Build the validator matching the shape of `schema`.
    pub fn from_description(schema: SchemaDescription, options: ValidatorOptions) -> Result<Self> {
        match schema {
            SchemaDescription::Tables(tables) => {
                Ok(Validator::Tables(SchemaValidator::new(&tables, options)?))
            }
            SchemaDescription::Columns(columns) => {
                Ok(Validator::Columns(ColumnValidator::new(&columns, options)?))
            }
        }
    }

    /// Decode a JSON schema description and build the matching validator.
    pub fn from_json(json: &str, options: ValidatorOptions) -> Result<Self> {
        Self::from_description(SchemaDescription::from_json(json)?, options)
    }

    pub fn table_exists(&self, table: &str) -> bool {
        match self {
            Validator::Tables(v) => v.table_exists(table),
            Validator::Columns(v) => v.table_exists(table),
        }
    }

    pub fn get_table_count(&self) -> usize {
        match self {
            Validator::Tables(v) => v.get_table_count(),
            Validator::Columns(v) => v.get_table_count(),
        }
    }

    pub fn options(&self) -> &ValidatorOptions {
        match self {
            Validator::Tables(v) => v.options(),
            Validator::Columns(v) => v.options(),
        }
    }
}

impl DriftValidator for Validator {
    type Schema = SchemaDescription;

    fn validate_versioned(&self, sql: &str, dialect: Option<&str>) -> Result<(u64, ValidationResult)> {
        match self {
            Validator::Tables(v) => v.validate_versioned(sql, dialect),
            Validator::Columns(v) => v.validate_versioned(sql, dialect),
        }
    }

    fn update_schema(&self, schema: SchemaDescription) -> Result<()> {
        match (self, schema) {
            (Validator::Tables(v), SchemaDescription::Tables(tables)) => v.update_schema(&tables),
            (Validator::Columns(v), SchemaDescription::Columns(columns)) => v.update_schema(&columns),
            (Validator::Tables(_), SchemaDescription::Columns(_)) => Err(Error::configuration(
                "a table-level validator cannot take a column schema",
            )),
            (Validator::Columns(_), SchemaDescription::Tables(_)) => Err(Error::configuration(
                "a column-level validator needs a table -> columns schema",
            )),
        }
    }

    fn schema_version(&self) -> u64 {
        match self {
            Validator::Tables(v) => v.schema_version(),
            Validator::Columns(v) => v.schema_version(),
        }
    }
}

/// Current snapshot of a hot-swappable schema
pub(crate) fn read_snapshot<T>(lock: &RwLock<Arc<T>>) -> Arc<T> {
    Arc::clone(&lock.read().unwrap_or_else(PoisonError::into_inner))
}

/// A schema snapshot stamped with the version it was installed under
pub(crate) trait Versioned {
    fn version(&self) -> u64;
}

/// Swap in a new snapshot under the next version and return that version.
///
/// Callers build the expensive lookup beforehand; `make` only pairs it with
/// the version, so the write lock is held for the swap alone.
pub(crate) fn swap_snapshot<T, F>(lock: &RwLock<Arc<T>>, make: F) -> u64
where
    T: Versioned,
    F: FnOnce(u64) -> T,
{
    let mut guard = lock.write().unwrap_or_else(PoisonError::into_inner);
    let version = guard.version() + 1;
    *guard = Arc::new(make(version));
    version
}

/// Physical tables referenced by `tree`, normalized and in first-occurrence order
pub(crate) fn referenced_tables(tree: &ScopeTree, options: &ValidatorOptions) -> Vec<NormalizedName> {
    crate::helper::dedupe_ordered(
        tree.tables()
            .iter()
            .map(|table| normalize_parts(&table.parts, options)),
    )
}
