use super::{read_snapshot, referenced_tables, swap_snapshot, DriftValidator, Versioned};
use crate::error::{Result, ValidationResult};
use crate::schema::{normalize, NormalizedName, TableSet, ValidatorOptions};
use crate::scope;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Default number of table suggestions offered per missing table
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

#[derive(Debug)]
struct TableSnapshot {
    version: u64,
    tables: TableSet,
}

impl Versioned for TableSnapshot {
    fn version(&self) -> u64 {
        self.version
    }
}

/// Table-level drift detection against a list of live table names.
///
/// # Example
///
/// ```
/// use sqldrift::{SchemaValidator, ValidatorOptions};
///
/// let validator = SchemaValidator::new(&["users", "orders"], ValidatorOptions::default()).unwrap();
/// let result = validator.validate("SELECT * FROM users JOIN orders ON users.id = orders.user_id", None).unwrap();
/// assert!(result.ok);
///
/// let result = validator.validate("SELECT * FROM invoices", None).unwrap();
/// assert_eq!(
///     result.message,
///     "Schema Drift Detected: The following tables were not found: ['invoices']"
/// );
/// ```
pub struct SchemaValidator {
    options: ValidatorOptions,
    snapshot: RwLock<Arc<TableSnapshot>>,
}

impl SchemaValidator {
    /// Build a validator; fails on blank table names or blank name components.
    pub fn new<S: AsRef<str>>(live_tables: &[S], options: ValidatorOptions) -> Result<Self> {
        let tables = TableSet::build(live_tables, &options)?;
        debug!(tables = tables.len(), "built table validator");
        Ok(Self {
            options,
            snapshot: RwLock::new(Arc::new(TableSnapshot { version: 0, tables })),
        })
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validate `sql` against the current live tables.
    ///
    /// Drift is reported through the returned result; only unparsable SQL or an
    /// unknown dialect produce an `Err`.
    pub fn validate(&self, sql: &str, dialect: Option<&str>) -> Result<ValidationResult> {
        self.validate_versioned(sql, dialect).map(|(_, result)| result)
    }

    fn check(&self, snapshot: &TableSnapshot, sql: &str, dialect: Option<&str>) -> Result<ValidationResult> {
        let tree = scope::scopes(sql, dialect, &self.options)?;
        let missing: Vec<NormalizedName> = referenced_tables(&tree, &self.options)
            .into_iter()
            .filter(|table| !snapshot.tables.contains(table))
            .collect();

        let result = if missing.is_empty() {
            ValidationResult::tables_ok()
        } else {
            ValidationResult::table_drift(missing)
        };
        debug!(
            ok = result.ok,
            missing = result.missing.len(),
            version = snapshot.version,
            "validated table references"
        );
        Ok(result)
    }

    /// Whether `table` is in the live set under the current policy.
    pub fn table_exists(&self, table: &str) -> bool {
        read_snapshot(&self.snapshot)
            .tables
            .contains(&normalize(table, &self.options))
    }

    /// Number of distinct live tables after normalization
    pub fn get_table_count(&self) -> usize {
        read_snapshot(&self.snapshot).tables.len()
    }

    /// Replace the live table list; the new version is visible to every later call.
    pub fn update_schema<S: AsRef<str>>(&self, live_tables: &[S]) -> Result<()> {
        let tables = TableSet::build(live_tables, &self.options)?;
        let count = tables.len();
        let version = swap_snapshot(&self.snapshot, |version| TableSnapshot { version, tables });
        info!(tables = count, version, "swapped live table schema");
        Ok(())
    }

    pub fn schema_version(&self) -> u64 {
        read_snapshot(&self.snapshot).version
    }

    /// Physical tables referenced by `sql`, in first-occurrence order.
    ///
    /// CTE names, derived-table aliases and table functions are excluded.
    pub fn extract_tables(&self, sql: &str, dialect: Option<&str>) -> Result<Vec<NormalizedName>> {
        let tree = scope::scopes(sql, dialect, &self.options)?;
        Ok(referenced_tables(&tree, &self.options))
    }

    /// Live tables resembling `table`: substring matches either way, or a
    /// shared three-character prefix. Sorted, at most `max_results`.
    pub fn suggest_tables(&self, table: &str, max_results: usize) -> Vec<String> {
        let wanted = normalize(table, &self.options);
        let wanted = wanted.key();
        let prefix: String = wanted.chars().take(3).collect();

        read_snapshot(&self.snapshot)
            .tables
            .sorted_names()
            .into_iter()
            .filter(|candidate| {
                let key = self.options.fold(candidate);
                key.contains(wanted)
                    || wanted.contains(key.as_str())
                    || (prefix.chars().count() == 3 && key.starts_with(&prefix))
            })
            .take(max_results)
            .collect()
    }

    /// Multi-line drift report for a failed result: one line per missing table
    /// with suggestions, then the available tables.
    ///
    /// Returns `None` for successful results.
    pub fn drift_report(&self, result: &ValidationResult) -> Option<String> {
        if result.ok {
            return None;
        }

        let mut lines = vec!["Schema Drift Detected:".to_string()];
        for table in &result.missing {
            let mut line = format!("- Table '{}' not found", table);
            let suggestions = self.suggest_tables(&table.to_string(), DEFAULT_MAX_SUGGESTIONS);
            if !suggestions.is_empty() {
                line.push_str(&format!(". Did you mean: {}", suggestions.join(", ")));
            }
            lines.push(line);
        }
        let available = read_snapshot(&self.snapshot).tables.sorted_names();
        lines.push(format!("  Available tables: {}", available.join(", ")));
        Some(lines.join("\n"))
    }
}

impl DriftValidator for SchemaValidator {
    type Schema = Vec<String>;

    fn validate_versioned(&self, sql: &str, dialect: Option<&str>) -> Result<(u64, ValidationResult)> {
        let snapshot = read_snapshot(&self.snapshot);
        let result = self.check(&snapshot, sql, dialect)?;
        Ok((snapshot.version, result))
    }

    fn update_schema(&self, schema: Vec<String>) -> Result<()> {
        SchemaValidator::update_schema(self, &schema)
    }

    fn schema_version(&self) -> u64 {
        SchemaValidator::schema_version(self)
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = read_snapshot(&self.snapshot);
        f.debug_struct("SchemaValidator")
            .field("options", &self.options)
            .field("tables", &snapshot.tables.len())
            .field("version", &snapshot.version)
            .finish()
    }
}
