//! sqldrift - schema drift detection for SQL queries
//!
//! This library checks, before execution, that every table and column a SQL
//! query references still exists in a caller-supplied live schema.
//!
//! # Architecture
//!
//! Validation follows a short pipeline:
//! 1. **Parser** - `sqlparser` turns the query into statements (per dialect)
//! 2. **Scope walker** - builds the scope tree and separates physical tables from
//!    CTEs, derived tables and table functions
//! 3. **Validator** - normalizes references and diffs them against a pre-built
//!    lookup of the live schema
//! 4. **Cache** - optionally memoizes verdicts per `(query, dialect, schema version)`
//!
//! Drift is reported as data (`ValidationResult { ok: false, .. }`); only
//! unparsable SQL, unknown dialects and bad configuration are errors.

pub mod cache;
pub mod dialects;
pub mod error;
pub mod helper;
pub mod schema;
pub mod scope;
pub mod validation;

pub use cache::{CacheInfo, CachedColumnValidator, CachedSchemaValidator, CachedValidator};
pub use dialects::{parse, query_fingerprint, resolve_dialect};
pub use error::{
    DriftKind, Error, Result, ValidationResult, COLUMNS_OK_MESSAGE, TABLES_OK_MESSAGE,
};
pub use helper::{closest_match, levenshtein, SUGGESTION_MAX_DISTANCE};
pub use schema::{
    normalize, normalize_parts, ColumnInfo, ColumnSchema, ColumnSet, NormalizedName,
    SchemaDescription, ValidatorOptions, DEFAULT_CACHE_SIZE,
};
pub use scope::{
    build_scope, scopes, Clause, ColumnRef, Scope, ScopeId, ScopeTree, ScopeType, SourceInfo,
    SourceKind, TableRef,
};
pub use validation::{ColumnValidator, DriftValidator, SchemaValidator, Validator};

/// Validate the tables of one query against a list of live tables.
///
/// One-shot convenience around [`SchemaValidator`] with default options.
///
/// # Arguments
/// * `sql` - The SQL text to check
/// * `live_tables` - Table names that exist, optionally schema-qualified
/// * `dialect` - Dialect token forwarded to the parser (`None` for generic SQL)
///
/// # Returns
/// The `(ok, message)` verdict, or an error for unparsable SQL
///
/// # Example
/// ```
/// use sqldrift::validate_query;
///
/// let live = ["events", "users", "orders", "products", "sessions"];
/// let (ok, message) = validate_query("SELECT * FROM nonexistent_table", &live, None).unwrap();
/// assert!(!ok);
/// assert_eq!(
///     message,
///     "Schema Drift Detected: The following tables were not found: ['nonexistent_table']"
/// );
/// ```
pub fn validate_query<S: AsRef<str>>(
    sql: &str,
    live_tables: &[S],
    dialect: Option<&str>,
) -> Result<(bool, String)> {
    let validator = SchemaValidator::new(live_tables, ValidatorOptions::default())?;
    Ok(validator.validate(sql, dialect)?.verdict())
}
