//! Identifier validation.
//!
//! Table and column names cannot be bound as statement parameters, so they are
//! interpolated into the statement text. Every name goes through this module
//! first; anything outside a plain `[A-Za-z_][A-Za-z0-9_$]*` word is refused.
//! Names are not quoted, so each engine's own case folding still applies.

use crate::error::{DbError, DbResult};

/// Maximum identifier length per part (MySQL's limit; PostgreSQL truncates at 63).
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate a single unqualified identifier (a column name).
pub fn validate_identifier(name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::invalid_identifier(name, "identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(DbError::invalid_identifier(name, "identifier contains a null byte"));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::invalid_identifier(
            name,
            format!(
                "identifier exceeds {} bytes (got {})",
                MAX_IDENTIFIER_LENGTH,
                name.len()
            ),
        ));
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok {
        return Err(DbError::invalid_identifier(
            name,
            "identifier must start with a letter or underscore",
        ));
    }

    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$')) {
        return Err(DbError::invalid_identifier(
            name,
            format!("identifier contains disallowed character {:?}", bad),
        ));
    }

    Ok(())
}

/// Validate a table name, optionally qualified once (`schema.table`).
pub fn validate_table_name(name: &str) -> DbResult<()> {
    match split_qualified(name) {
        (Some(schema), table) => {
            validate_identifier(schema)?;
            validate_identifier(table)
        }
        (None, table) => validate_identifier(table),
    }
}

/// Validate every column name in order, failing on the first bad one.
pub fn validate_columns(columns: &[&str]) -> DbResult<()> {
    columns.iter().try_for_each(|c| validate_identifier(c))
}

/// Split `schema.table` into its parts. Only the first dot separates.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}
