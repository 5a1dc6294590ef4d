//! Live schema descriptions and name normalization
//!
//! This module provides:
//! - Normalization of table and column names under case and qualification policies
//! - Caller-supplied schema descriptions (table lists or table -> columns maps)
//! - Pre-computed lookup structures built once per schema hot-swap
//!
//! Normalized names keep the caller's original spelling for messages and compare
//! on a folded key, so `normalize(normalize(x)) == normalize(x)` holds for every input.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Default capacity of the validation result cache
pub const DEFAULT_CACHE_SIZE: usize = 128;

/// Name matching policy shared by every validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    /// Compare names exactly instead of case-folding them
    pub case_sensitive: bool,
    /// Keep schema/database qualifiers as part of a table's identity
    pub preserve_schema: bool,
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable case-sensitive matching
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Enable or disable schema-qualified matching
    pub fn with_preserve_schema(mut self, preserve_schema: bool) -> Self {
        self.preserve_schema = preserve_schema;
        self
    }

    /// Fold a single identifier according to the case policy
    pub fn fold(&self, name: &str) -> String {
        fold(name, self.case_sensitive)
    }
}

pub(crate) fn fold(name: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        name.to_string()
    } else {
        name.to_lowercase()
    }
}

/// A table or column name after normalization.
///
/// Equality and hashing use the folded key only; `Display` renders the original
/// spelling (`qualifier.name`).
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedName {
    qualifier: Option<String>,
    name: String,
    #[serde(skip)]
    key: String,
}

impl NormalizedName {
    /// Build a name from an optional qualifier and a base name.
    pub fn new(qualifier: Option<&str>, name: &str, case_sensitive: bool) -> Self {
        let qualifier = qualifier.map(str::to_string);
        let name = name.to_string();
        let display = render(qualifier.as_deref(), &name);
        Self {
            qualifier,
            name,
            key: fold(&display, case_sensitive),
        }
    }

    /// The schema/database qualifier (or owning table, for missing columns)
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// The rightmost name component, original spelling
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Folded identity used for lookups
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for NormalizedName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for NormalizedName {}

impl Hash for NormalizedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self.qualifier.as_deref(), &self.name))
    }
}

/// `qualifier.name`, quoting a base name that contains a dot so the rendered
/// form splits back into the same components.
fn render(qualifier: Option<&str>, name: &str) -> String {
    let name = if name.contains('.') {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    };
    match qualifier {
        Some(q) => format!("{}.{}", q, name),
        None => name,
    }
}

/// Normalize a possibly qualified name such as `public.users`.
///
/// Components are split on dots outside quotes, then trimmed and unquoted until
/// nothing changes.
/// Without `preserve_schema` only the rightmost component survives.
///
/// # Example
///
/// ```
/// use sqldrift::schema::{normalize, ValidatorOptions};
///
/// let opts = ValidatorOptions::default();
/// let name = normalize("Public.Users", &opts);
/// assert_eq!(name.to_string(), "Users");
/// assert_eq!(name, normalize("users", &opts));
/// ```
pub fn normalize(name: &str, options: &ValidatorOptions) -> NormalizedName {
    let parts = split_name(name);
    normalize_parts(&parts, options)
}

/// Normalize a name that the parser already split into components.
pub fn normalize_parts<S: AsRef<str>>(parts: &[S], options: &ValidatorOptions) -> NormalizedName {
    let cleaned: Vec<&str> = parts.iter().map(|p| clean_part(p.as_ref())).collect();

    match cleaned.split_last() {
        None => NormalizedName::new(None, "", options.case_sensitive),
        Some((name, qualifiers)) => {
            if options.preserve_schema && !qualifiers.is_empty() {
                let qualifier = qualifiers.join(".");
                NormalizedName::new(Some(&qualifier), name, options.case_sensitive)
            } else {
                NormalizedName::new(None, name, options.case_sensitive)
            }
        }
    }
}

/// Split on dots that are not inside `"..."`, `` `...` `` or `[...]`.
fn split_name(name: &str) -> Vec<&str> {
    let name = name.trim();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut closing: Option<char> = None;

    for (i, c) in name.char_indices() {
        match closing {
            Some(end) if c == end => closing = None,
            Some(_) => {}
            None => match c {
                '"' => closing = Some('"'),
                '`' => closing = Some('`'),
                '[' => closing = Some(']'),
                '.' => {
                    parts.push(&name[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&name[start..]);
    parts
}

/// Trim and unquote a component until it reaches a fixed point.
fn clean_part(part: &str) -> &str {
    let mut current = part.trim();
    loop {
        let next = unquote(current).trim();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn unquote(part: &str) -> &str {
    let bytes = part.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"')
            || (first == b'`' && last == b'`')
            || (first == b'[' && last == b']')
        {
            return &part[1..part.len() - 1];
        }
    }
    part
}

/// Reject names with an empty component (`""`, `"public."`, `".users"`).
fn check_table_name(name: &str) -> Result<()> {
    if split_name(name).iter().any(|p| clean_part(p).is_empty()) {
        return Err(Error::configuration(format!(
            "table name {:?} has an empty component",
            name
        )));
    }
    Ok(())
}

/// Normalized set of live table names with O(1) membership checks.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    names: HashMap<String, NormalizedName>,
}

impl TableSet {
    /// Build the set, failing fast on malformed names.
    pub fn build<S: AsRef<str>>(tables: &[S], options: &ValidatorOptions) -> Result<Self> {
        let mut names = HashMap::with_capacity(tables.len());
        for table in tables {
            let raw = table.as_ref();
            check_table_name(raw)?;
            let normalized = normalize(raw, options);
            names.entry(normalized.key().to_string()).or_insert(normalized);
        }
        Ok(Self { names })
    }

    pub fn contains(&self, name: &NormalizedName) -> bool {
        self.names.contains_key(name.key())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display names ordered by folded key
    pub fn sorted_names(&self) -> Vec<String> {
        let mut entries: Vec<(&String, &NormalizedName)> = self.names.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, n)| n.to_string()).collect()
    }
}

/// Ordered column names of one table plus optional, informational type strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet {
    pub columns: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

impl ColumnSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            types: Vec::new(),
        }
    }

    /// Attach per-column type strings, positionally
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }
}

/// Table name -> column set mapping for column-level validation.
///
/// Deserializes from the `{"users": {"columns": [...], "types": [...]}}` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSchema {
    tables: BTreeMap<String, ColumnSet>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style table insertion
    pub fn table(mut self, name: impl Into<String>, columns: ColumnSet) -> Self {
        self.insert(name, columns);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, columns: ColumnSet) {
        self.tables.insert(name.into(), columns);
    }

    /// Decode a schema from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnSet)> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, ColumnSet)> for ColumnSchema {
    fn from_iter<T: IntoIterator<Item = (K, ColumnSet)>>(iter: T) -> Self {
        let mut schema = ColumnSchema::new();
        for (name, columns) in iter {
            schema.insert(name, columns);
        }
        schema
    }
}

/// Either kind of live schema a caller can hand to a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaDescription {
    /// Table names only, for table-level validation
    Tables(Vec<String>),
    /// Table -> columns, for column-level validation
    Columns(ColumnSchema),
}

impl SchemaDescription {
    /// Decode either a JSON list of table names or a table -> columns object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<Vec<String>> for SchemaDescription {
    fn from(tables: Vec<String>) -> Self {
        SchemaDescription::Tables(tables)
    }
}

impl From<ColumnSchema> for SchemaDescription {
    fn from(schema: ColumnSchema) -> Self {
        SchemaDescription::Columns(schema)
    }
}

/// Metadata about one live column, in the caller's original spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub table: String,
    pub column: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct TableColumns {
    pub name: NormalizedName,
    pub raw_name: String,
    /// folded column name -> info
    pub columns: HashMap<String, ColumnInfo>,
    /// folded column names in declaration order
    pub order: Vec<String>,
}

/// Pre-computed table -> column lookup for column-level validation.
#[derive(Debug, Clone, Default)]
pub struct ColumnLookup {
    tables: HashMap<String, TableColumns>,
    case_sensitive: bool,
}

impl ColumnLookup {
    /// Build the lookup, failing fast on malformed input.
    ///
    /// Tables that collapse onto the same normalized name (e.g. `a.users` and
    /// `b.users` without `preserve_schema`) merge their column sets.
    pub fn build(schema: &ColumnSchema, options: &ValidatorOptions) -> Result<Self> {
        let mut tables: HashMap<String, TableColumns> = HashMap::with_capacity(schema.len());

        for (raw_table, set) in schema.iter() {
            check_table_name(raw_table)?;
            if set.types.len() > set.columns.len() {
                return Err(Error::configuration(format!(
                    "table {:?} declares {} types for {} columns",
                    raw_table,
                    set.types.len(),
                    set.columns.len()
                )));
            }

            let name = normalize(raw_table, options);
            let entry = tables
                .entry(name.key().to_string())
                .or_insert_with(|| TableColumns {
                    name: name.clone(),
                    raw_name: raw_table.clone(),
                    columns: HashMap::with_capacity(set.columns.len()),
                    order: Vec::with_capacity(set.columns.len()),
                });

            for (i, column) in set.columns.iter().enumerate() {
                let column = column.trim();
                if column.is_empty() {
                    return Err(Error::configuration(format!(
                        "table {:?} has a blank column name",
                        raw_table
                    )));
                }
                let key = options.fold(column);
                if entry.columns.contains_key(&key) {
                    continue;
                }
                entry.order.push(key.clone());
                entry.columns.insert(
                    key,
                    ColumnInfo {
                        table: raw_table.clone(),
                        column: column.to_string(),
                        data_type: set.types.get(i).cloned(),
                    },
                );
            }
        }

        Ok(Self {
            tables,
            case_sensitive: options.case_sensitive,
        })
    }

    pub fn contains_table(&self, table: &NormalizedName) -> bool {
        self.tables.contains_key(table.key())
    }

    pub fn contains_column(&self, table: &NormalizedName, column: &str) -> bool {
        self.tables
            .get(table.key())
            .is_some_and(|t| t.columns.contains_key(&fold(column.trim(), self.case_sensitive)))
    }

    pub fn column_info(&self, table: &NormalizedName, column: &str) -> Option<&ColumnInfo> {
        self.tables
            .get(table.key())
            .and_then(|t| t.columns.get(&fold(column.trim(), self.case_sensitive)))
    }

    /// Column names of a table in declaration order, original spelling
    pub fn column_names(&self, table: &NormalizedName) -> Vec<&str> {
        match self.tables.get(table.key()) {
            Some(t) => t
                .order
                .iter()
                .filter_map(|k| t.columns.get(k))
                .map(|c| c.column.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Canonical display name of a live table
    pub fn table_name(&self, table: &NormalizedName) -> Option<&NormalizedName> {
        self.tables.get(table.key()).map(|t| &t.name)
    }

    pub fn column_count(&self, table: &NormalizedName) -> Option<usize> {
        self.tables.get(table.key()).map(|t| t.columns.len())
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub(crate) fn tables(&self) -> impl Iterator<Item = &TableColumns> {
        self.tables.values()
    }
}
