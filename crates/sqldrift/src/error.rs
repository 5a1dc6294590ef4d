//! Error and result types for sqldrift

use crate::schema::NormalizedName;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// The result type for sqldrift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a validation call from producing a drift verdict.
///
/// Drift itself is never an error: a query that references missing tables or
/// columns yields an `Ok(ValidationResult)` with `ok == false`.
#[derive(Debug, Error)]
pub enum Error {
    /// The query is not valid SQL for the requested dialect
    #[error("Invalid SQL syntax: {0}")]
    Parse(String),

    /// The dialect token is not known to the parser
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    /// Invalid construction or hot-swap arguments
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A schema description could not be decoded
    #[error("Invalid schema description: {0}")]
    InvalidSchema(#[from] serde_json::Error),
}

impl Error {
    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Create an unknown dialect error
    pub fn unknown_dialect(dialect: impl Into<String>) -> Self {
        Error::UnknownDialect(dialect.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Whether this error came from the SQL parser
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Parse(_))
    }
}

impl From<sqlparser::parser::ParserError> for Error {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Error::Parse(err.to_string())
    }
}

/// Message returned when every referenced table exists
pub const TABLES_OK_MESSAGE: &str = "Query is safe to execute.";

/// Message returned when every referenced column exists
pub const COLUMNS_OK_MESSAGE: &str = "All columns exist.";

/// Which kind of drift a failed validation found
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DriftKind {
    /// One or more physical tables are missing
    Table,
    /// One or more columns are missing from their owning tables
    Column,
}

/// Result of validating one query against the live schema
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the query is safe to execute
    pub ok: bool,
    /// Human readable verdict
    pub message: String,
    /// Kind of drift found, if any
    pub kind: Option<DriftKind>,
    /// Missing names in first-occurrence order
    pub missing: Vec<NormalizedName>,
    /// Nearest existing column for each missing column, keyed by display name
    pub suggestions: BTreeMap<String, String>,
}

impl ValidationResult {
    /// Successful table-level validation
    pub fn tables_ok() -> Self {
        Self::success(TABLES_OK_MESSAGE)
    }

    /// Successful column-level validation
    pub fn columns_ok() -> Self {
        Self::success(COLUMNS_OK_MESSAGE)
    }

    fn success(message: &str) -> Self {
        Self {
            ok: true,
            message: message.to_string(),
            kind: None,
            missing: Vec::new(),
            suggestions: BTreeMap::new(),
        }
    }

    /// Table drift: `missing` must already be deduplicated and in occurrence order
    pub fn table_drift(missing: Vec<NormalizedName>) -> Self {
        let message = format!(
            "Schema Drift Detected: The following tables were not found: [{}]",
            quoted_list(&missing)
        );
        Self {
            ok: false,
            message,
            kind: Some(DriftKind::Table),
            missing,
            suggestions: BTreeMap::new(),
        }
    }

    /// Column drift with optional nearest-match suggestions
    pub fn column_drift(
        missing: Vec<NormalizedName>,
        suggestions: BTreeMap<String, String>,
    ) -> Self {
        let mut message = format!(
            "Column Drift Detected: The following columns were not found: [{}]",
            quoted_list(&missing)
        );

        // Follow `missing` order rather than the map's key order
        let hints: Vec<String> = missing
            .iter()
            .filter_map(|name| {
                let display = name.to_string();
                suggestions
                    .get(&display)
                    .map(|s| format!("'{}' -> '{}'", display, s))
            })
            .collect();
        if !hints.is_empty() {
            message.push_str(". Did you mean: ");
            message.push_str(&hints.join(", "));
        }

        Self {
            ok: false,
            message,
            kind: Some(DriftKind::Column),
            missing,
            suggestions,
        }
    }

    /// The `(ok, message)` drift verdict
    pub fn verdict(&self) -> (bool, String) {
        (self.ok, self.message.clone())
    }

    /// Display names of everything reported missing
    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(|n| n.to_string()).collect()
    }
}

fn quoted_list(names: &[NormalizedName]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}
