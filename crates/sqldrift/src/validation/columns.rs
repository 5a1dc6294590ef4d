use super::{read_snapshot, swap_snapshot, DriftValidator, Versioned};
use crate::error::{Result, ValidationResult};
use crate::helper::{closest_match, dedupe_ordered, SUGGESTION_MAX_DISTANCE};
use crate::schema::{
    normalize, normalize_parts, ColumnInfo, ColumnLookup, ColumnSchema, NormalizedName,
    ValidatorOptions,
};
use crate::scope::{self, ColumnRef, ScopeTree, SourceInfo};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, trace};

#[derive(Debug)]
struct ColumnSnapshot {
    version: u64,
    lookup: ColumnLookup,
}

impl Versioned for ColumnSnapshot {
    fn version(&self) -> u64 {
        self.version
    }
}

/// Outcome of resolving one column reference
#[derive(Debug)]
enum Resolution {
    /// At least one physical candidate owns the column
    Found,
    /// Cannot be checked (CTE, derived table, function, alias, missing owner)
    Accepted,
    /// The qualifier names a physical table that is not live
    MissingTable(NormalizedName),
    /// No candidate owns the column
    MissingColumn {
        name: NormalizedName,
        candidates: Vec<NormalizedName>,
    },
}

/// Column-level drift detection against a table -> columns schema.
///
/// Table drift takes precedence: when a query references a table that is not
/// live, the result reports the missing tables exactly like [`SchemaValidator`]
/// and no column drift is computed.
///
/// [`SchemaValidator`]: super::SchemaValidator
///
/// # Example
///
/// ```
/// use sqldrift::{ColumnSchema, ColumnSet, ColumnValidator, ValidatorOptions};
///
/// let schema = ColumnSchema::new().table("users", ColumnSet::new(["id", "name", "email"]));
/// let validator = ColumnValidator::new(&schema, ValidatorOptions::default()).unwrap();
///
/// let result = validator.validate("SELECT emale FROM users", None).unwrap();
/// assert!(!result.ok);
/// assert_eq!(result.suggestions.get("emale").map(String::as_str), Some("email"));
/// ```
pub struct ColumnValidator {
    options: ValidatorOptions,
    snapshot: RwLock<Arc<ColumnSnapshot>>,
}

impl ColumnValidator {
    /// Build a validator; fails on blank names or more types than columns.
    pub fn new(schema: &ColumnSchema, options: ValidatorOptions) -> Result<Self> {
        let lookup = ColumnLookup::build(schema, &options)?;
        debug!(tables = lookup.table_count(), "built column validator");
        Ok(Self {
            options,
            snapshot: RwLock::new(Arc::new(ColumnSnapshot { version: 0, lookup })),
        })
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validate every table and column reference of `sql`.
    pub fn validate(&self, sql: &str, dialect: Option<&str>) -> Result<ValidationResult> {
        self.validate_versioned(sql, dialect).map(|(_, result)| result)
    }

    fn check(&self, snapshot: &ColumnSnapshot, sql: &str, dialect: Option<&str>) -> Result<ValidationResult> {
        let tree = scope::scopes(sql, dialect, &self.options)?;
        let lookup = &snapshot.lookup;

        // (position, table) so qualifier-implied tables interleave with FROM tables
        let mut missing_tables: Vec<(usize, NormalizedName)> = tree
            .tables()
            .iter()
            .map(|t| (t.position, normalize_parts(&t.parts, &self.options)))
            .filter(|(_, name)| !lookup.contains_table(name))
            .collect();

        let mut missing_columns: Vec<NormalizedName> = Vec::new();
        let mut suggestions = BTreeMap::new();

        for column in tree.columns() {
            match self.resolve(&tree, column, lookup) {
                Resolution::Found | Resolution::Accepted => {}
                Resolution::MissingTable(table) => missing_tables.push((column.position, table)),
                Resolution::MissingColumn { name, candidates } => {
                    if missing_columns.contains(&name) {
                        continue;
                    }
                    let nearest = closest_match(
                        &column.name,
                        candidates.iter().flat_map(|t| lookup.column_names(t)),
                        SUGGESTION_MAX_DISTANCE,
                    );
                    if let Some(nearest) = nearest {
                        suggestions.insert(name.to_string(), nearest.to_string());
                    }
                    missing_columns.push(name);
                }
            }
        }

        let result = if !missing_tables.is_empty() {
            missing_tables.sort_by_key(|(position, _)| *position);
            ValidationResult::table_drift(dedupe_ordered(
                missing_tables.into_iter().map(|(_, name)| name),
            ))
        } else if !missing_columns.is_empty() {
            ValidationResult::column_drift(missing_columns, suggestions)
        } else {
            ValidationResult::columns_ok()
        };

        debug!(
            ok = result.ok,
            kind = ?result.kind,
            missing = result.missing.len(),
            version = snapshot.version,
            "validated column references"
        );
        Ok(result)
    }

    fn resolve(&self, tree: &ScopeTree, column: &ColumnRef, lookup: &ColumnLookup) -> Resolution {
        if column.is_qualified() {
            return match tree.find_source(column.scope, &column.qualifier, &self.options) {
                Some(source) => match source.table_parts() {
                    Some(parts) => {
                        let table = normalize_parts(parts, &self.options);
                        if lookup.contains_table(&table) {
                            self.check_owner(table, column, lookup)
                        } else {
                            // reported through the table reference itself
                            Resolution::Accepted
                        }
                    }
                    None => Resolution::Accepted,
                },
                None => {
                    let table = normalize_parts(&column.qualifier, &self.options);
                    if lookup.contains_table(&table) {
                        self.check_owner(table, column, lookup)
                    } else {
                        Resolution::MissingTable(table)
                    }
                }
            };
        }

        // Only ORDER BY, GROUP BY and HAVING may name an output alias
        if column.clause.accepts_projection_alias()
            && tree
                .scope(column.scope)
                .projection_aliases
                .iter()
                .any(|alias| self.options.fold(alias) == self.options.fold(&column.name))
        {
            return Resolution::Accepted;
        }

        let sources: Vec<&SourceInfo> = tree
            .resolution_chain(column.scope)
            .into_iter()
            .flat_map(|s| s.sources.iter())
            .collect();

        let mut candidates = Vec::with_capacity(sources.len());
        let mut owners = 0usize;
        for source in sources {
            let Some(parts) = source.table_parts() else {
                return Resolution::Accepted;
            };
            let table = normalize_parts(parts, &self.options);
            if !lookup.contains_table(&table) {
                return Resolution::Accepted;
            }
            if lookup.contains_column(&table, &column.name) {
                owners += 1;
            }
            candidates.push(table);
        }

        if owners > 1 {
            trace!(column = %column.name, owners, "ambiguous column ownership");
        }
        if owners > 0 {
            return Resolution::Found;
        }
        Resolution::MissingColumn {
            name: NormalizedName::new(None, &column.name, self.options.case_sensitive),
            candidates,
        }
    }

    fn check_owner(&self, table: NormalizedName, column: &ColumnRef, lookup: &ColumnLookup) -> Resolution {
        if lookup.contains_column(&table, &column.name) {
            return Resolution::Found;
        }
        let qualifier = table.to_string();
        Resolution::MissingColumn {
            name: NormalizedName::new(Some(&qualifier), &column.name, self.options.case_sensitive),
            candidates: vec![table],
        }
    }

    pub fn table_exists(&self, table: &str) -> bool {
        read_snapshot(&self.snapshot)
            .lookup
            .contains_table(&normalize(table, &self.options))
    }

    pub fn get_table_count(&self) -> usize {
        read_snapshot(&self.snapshot).lookup.table_count()
    }

    /// Number of columns of `table`, or `None` if the table is not live
    pub fn get_column_count(&self, table: &str) -> Option<usize> {
        read_snapshot(&self.snapshot)
            .lookup
            .column_count(&normalize(table, &self.options))
    }

    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        read_snapshot(&self.snapshot)
            .lookup
            .contains_column(&normalize(table, &self.options), column)
    }

    /// Original-case table and column names plus the declared type, if any
    pub fn get_column_info(&self, table: &str, column: &str) -> Option<ColumnInfo> {
        read_snapshot(&self.snapshot)
            .lookup
            .column_info(&normalize(table, &self.options), column)
            .cloned()
    }

    /// Columns whose name contains `column` or is contained in it, as
    /// `table.column`, sorted.
    pub fn suggest_alternatives(&self, column: &str) -> Vec<String> {
        let wanted = self.options.fold(column.trim());
        if wanted.is_empty() {
            return Vec::new();
        }

        let snapshot = read_snapshot(&self.snapshot);
        let mut suggestions: Vec<String> = snapshot
            .lookup
            .tables()
            .flat_map(|table| {
                let wanted = wanted.as_str();
                table
                    .order
                    .iter()
                    .filter(move |key| key.contains(wanted) || wanted.contains(key.as_str()))
                    .filter_map(move |key| table.columns.get(key))
                    .map(|info| format!("{}.{}", info.table, info.column))
            })
            .collect();
        suggestions.sort();
        suggestions
    }

    /// Column references of `sql` as `(table, column)`, folded and deduplicated.
    ///
    /// Qualifiers are resolved through aliases to the underlying table name;
    /// unqualified references carry `None`. References into CTEs and derived
    /// tables keep the CTE/alias name.
    pub fn extract_columns(&self, sql: &str, dialect: Option<&str>) -> Result<Vec<(Option<String>, String)>> {
        let tree = scope::scopes(sql, dialect, &self.options)?;
        let columns = tree.columns().iter().map(|column| {
            let table = if column.is_qualified() {
                let name = match tree
                    .find_source(column.scope, &column.qualifier, &self.options)
                    .and_then(SourceInfo::table_parts)
                {
                    Some(parts) => normalize_parts(parts, &self.options),
                    None => normalize_parts(&column.qualifier, &self.options),
                };
                Some(name.key().to_string())
            } else {
                None
            };
            (table, self.options.fold(&column.name))
        });
        Ok(dedupe_ordered(columns))
    }

    /// Replace the live schema; the new version is visible to every later call.
    pub fn update_schema(&self, schema: &ColumnSchema) -> Result<()> {
        let lookup = ColumnLookup::build(schema, &self.options)?;
        let count = lookup.table_count();
        let version = swap_snapshot(&self.snapshot, |version| ColumnSnapshot { version, lookup });
        info!(tables = count, version, "swapped live column schema");
        Ok(())
    }

    pub fn schema_version(&self) -> u64 {
        read_snapshot(&self.snapshot).version
    }
}

impl DriftValidator for ColumnValidator {
    type Schema = ColumnSchema;

    fn validate_versioned(&self, sql: &str, dialect: Option<&str>) -> Result<(u64, ValidationResult)> {
        let snapshot = read_snapshot(&self.snapshot);
        let result = self.check(&snapshot, sql, dialect)?;
        Ok((snapshot.version, result))
    }

    fn update_schema(&self, schema: ColumnSchema) -> Result<()> {
        ColumnValidator::update_schema(self, &schema)
    }

    fn schema_version(&self) -> u64 {
        ColumnValidator::schema_version(self)
    }
}

impl fmt::Debug for ColumnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = read_snapshot(&self.snapshot);
        f.debug_struct("ColumnValidator")
            .field("options", &self.options)
            .field("tables", &snapshot.lookup.table_count())
            .field("version", &snapshot.version)
            .finish()
    }
}
