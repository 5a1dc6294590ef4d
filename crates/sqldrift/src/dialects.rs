//! Dialect selection and parsing
//!
//! The dialect is an opaque token forwarded to `sqlparser`. A few names used by
//! other SQL tooling (sqlglot-style `tsql`, `athena`, `spark`, ...) are mapped
//! onto the closest dialect `sqlparser` ships.

use crate::error::{Error, Result};
use sqlparser::ast::Statement;
use sqlparser::dialect::{dialect_from_str, Dialect, GenericDialect};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::LazyLock;

static DIALECT_ALIASES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("tsql", "mssql"),
        ("sqlserver", "mssql"),
        ("synapse", "mssql"),
        ("azure_synapse", "mssql"),
        ("fabric", "mssql"),
        ("athena", "generic"),
        ("presto", "generic"),
        ("trino", "generic"),
        ("glue", "hive"),
        ("spark", "databricks"),
        ("spark2", "databricks"),
        ("pg", "postgresql"),
    ])
});

/// Resolve a dialect token; `None` or an empty token selects the generic dialect.
pub fn resolve_dialect(dialect: Option<&str>) -> Result<Box<dyn Dialect>> {
    let token = match dialect.map(str::trim) {
        None | Some("") => return Ok(Box::new(GenericDialect {})),
        Some(token) => token.to_lowercase(),
    };
    let name = DIALECT_ALIASES
        .get(token.as_str())
        .copied()
        .unwrap_or(token.as_str());

    dialect_from_str(name).ok_or_else(|| Error::unknown_dialect(token.clone()))
}

/// Parse every statement in `sql`.
pub fn parse(sql: &str, dialect: Option<&str>) -> Result<Vec<Statement>> {
    let d = resolve_dialect(dialect)?;
    Ok(Parser::parse_sql(d.as_ref(), sql)?)
}

/// Dialect-aware cache key for `sql`.
///
/// Spacing between tokens is dropped; every other token, comments and quoted
/// identifiers included, is kept verbatim. Text the tokenizer rejects is used
/// as written.
pub fn query_fingerprint(sql: &str, dialect: Option<&str>) -> String {
    let tokens = resolve_dialect(dialect)
        .ok()
        .and_then(|d| Tokenizer::new(d.as_ref(), sql).tokenize().ok());
    let Some(tokens) = tokens else {
        return sql.to_string();
    };

    let mut key = String::with_capacity(sql.len() * 2);
    for token in tokens {
        match token {
            Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab)
            | Token::EOF => {}
            // Debug output escapes quotes and control characters, so the
            // separator never occurs inside a token
            token => {
                let _ = write!(key, "{:?}\u{1f}", token);
            }
        }
    }
    key
}
