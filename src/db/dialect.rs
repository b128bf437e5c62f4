//! SQL dialects.
//!
//! Each engine gets its own dialect object carrying its placeholder syntax and
//! introspection query. The statement builders are pure: they validate their
//! inputs and return a [`Statement`] (SQL text plus the values to bind, in bind
//! order) without touching a connection.
//!
//! | Engine     | Placeholder         | Columns query                              |
//! |------------|---------------------|--------------------------------------------|
//! | MySQL      | `?` (repeated)      | `SHOW COLUMNS FROM <table>`                |
//! | PostgreSQL | `$1, $2, ...`       | `information_schema.columns` by table name |

use crate::db::identifier::{split_qualified, validate_columns, validate_table_name};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Filter, Value};

/// A built statement: SQL text and its bound values in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    fn new(sql: String, args: Vec<Value>) -> Self {
        Self { sql, args }
    }
}

/// Engine-specific SQL syntax.
///
/// Implementors provide the fragment builders; the statement builders are
/// shared and assemble those fragments in a fixed shape.
pub trait Dialect: Send + Sync {
    /// The engine this dialect targets.
    fn db_type(&self) -> DatabaseType;

    /// Placeholder token for the bound value at 1-based `position`.
    fn placeholder(&self, position: usize) -> String;

    /// `n` placeholder tokens, comma-joined. Empty for `n == 0`.
    fn placeholders(&self, n: usize) -> String;

    /// `col = <placeholder>` pairs, comma-joined, in input order.
    fn set_clause(&self, names: &[&str]) -> String;

    /// The engine's native column-introspection query for `table`.
    fn columns_statement(&self, table: &str) -> DbResult<Statement>;

    /// Comma-join column names, order preserved.
    fn join_columns(&self, names: &[&str]) -> String {
        names.join(", ")
    }

    /// `INSERT INTO <table> (<columns>) VALUES (<placeholders>)`
    fn insert(&self, table: &str, columns: &[&str], values: &[Value]) -> DbResult<Statement> {
        ensure_aligned(columns, values)?;
        validate_table_name(table)?;
        validate_columns(columns)?;

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            self.join_columns(columns),
            self.placeholders(values.len())
        );
        Ok(Statement::new(sql, values.to_vec()))
    }

    /// `SELECT <columns> FROM <table> WHERE <filter>`
    fn select(&self, table: &str, columns: &[&str], filter: &Filter) -> DbResult<Statement> {
        if columns.is_empty() {
            return Err(DbError::precondition("at least one column must be selected"));
        }
        validate_table_name(table)?;
        validate_columns(columns)?;
        ensure_fragment(filter)?;

        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.join_columns(columns),
            table,
            filter.fragment
        );
        Ok(Statement::new(sql, filter.args.clone()))
    }

    /// `UPDATE <table> SET <set clause> WHERE <filter>`
    ///
    /// Bind order is all SET values first, then the filter arguments.
    fn update(
        &self,
        table: &str,
        columns: &[&str],
        values: &[Value],
        filter: &Filter,
    ) -> DbResult<Statement> {
        ensure_aligned(columns, values)?;
        validate_table_name(table)?;
        validate_columns(columns)?;
        ensure_fragment(filter)?;

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            self.set_clause(columns),
            filter.fragment
        );
        let args = values.iter().chain(filter.args.iter()).cloned().collect();
        Ok(Statement::new(sql, args))
    }

    /// `DELETE FROM <table> WHERE <filter>`
    fn delete(&self, table: &str, filter: &Filter) -> DbResult<Statement> {
        validate_table_name(table)?;
        ensure_fragment(filter)?;

        let sql = format!("DELETE FROM {} WHERE {}", table, filter.fragment);
        Ok(Statement::new(sql, filter.args.clone()))
    }
}

/// Columns and values must pair up one-to-one.
fn ensure_aligned(columns: &[&str], values: &[Value]) -> DbResult<()> {
    if columns.len() != values.len() {
        return Err(DbError::precondition(format!(
            "column/value count mismatch: {} columns, {} values",
            columns.len(),
            values.len()
        )));
    }
    if columns.is_empty() {
        return Err(DbError::precondition("at least one column is required"));
    }
    Ok(())
}

fn ensure_fragment(filter: &Filter) -> DbResult<()> {
    if filter.fragment.trim().is_empty() {
        return Err(DbError::invalid_input(
            "filter fragment cannot be empty; use Filter::all() to match every row",
        ));
    }
    Ok(())
}

/// MySQL dialect: one repeated `?` token, bound positionally by the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn placeholders(&self, n: usize) -> String {
        vec!["?"; n].join(", ")
    }

    fn set_clause(&self, names: &[&str]) -> String {
        names
            .iter()
            .map(|col| format!("{} = ?", col))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn columns_statement(&self, table: &str) -> DbResult<Statement> {
        validate_table_name(table)?;
        Ok(Statement::new(format!("SHOW COLUMNS FROM {}", table), Vec::new()))
    }
}

/// PostgreSQL dialect: numbered `$n` tokens, the n-th token binds the n-th value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    const COLUMNS_QUERY: &'static str = r#"
        SELECT column_name::text AS column_name
        FROM information_schema.columns
        WHERE table_schema = COALESCE($1, current_schema())::text
        AND table_name = $2
        ORDER BY ordinal_position
        "#;
}

impl Dialect for PostgresDialect {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${}", position)
    }

    fn placeholders(&self, n: usize) -> String {
        (1..=n)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn set_clause(&self, names: &[&str]) -> String {
        names
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = {}", col, self.placeholder(i + 1)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn columns_statement(&self, table: &str) -> DbResult<Statement> {
        validate_table_name(table)?;
        let (schema, name) = split_qualified(table);
        Ok(Statement::new(
            Self::COLUMNS_QUERY.to_string(),
            vec![Value::from(schema), Value::from(name)],
        ))
    }
}
