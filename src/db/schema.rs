//! Schema introspection.
//!
//! Column listing for a table, using each engine's native catalog. The SQL
//! itself comes from the engine's dialect ([`Dialect::columns_statement`]);
//! this module runs it and reads the column-name column out of the result.
//!
//! [`Dialect::columns_statement`]: crate::db::dialect::Dialect::columns_statement

use crate::db::dialect::Statement;
use crate::error::{DbError, DbResult};
use tracing::debug;

/// An empty column list means the table is missing or invisible to this session.
fn ensure_found(table: &str, names: Vec<String>) -> DbResult<Vec<String>> {
    if names.is_empty() {
        return Err(DbError::schema(
            format!("table '{}' not found or has no visible columns", table),
            table,
        ));
    }
    debug!(table = %table, columns = names.len(), "Fetched column names");
    Ok(names)
}

pub(crate) mod mysql {
    use super::*;
    use crate::db::types::mysql_text_at;
    use sqlx::Executor;
    use sqlx::mysql::MySqlConnection;

    /// Column of `SHOW COLUMNS` output holding the column name.
    const FIELD_COLUMN: &str = "Field";

    /// Run `SHOW COLUMNS` and keep only the `Field` column.
    pub async fn field_names(
        conn: &mut MySqlConnection,
        table: &str,
        statement: &Statement,
    ) -> DbResult<Vec<String>> {
        // SHOW statements go over the text protocol; they take no parameters
        let rows = conn
            .fetch_all(statement.sql.as_str())
            .await
            .map_err(|e| DbError::query_exec(&statement.sql, e))?;

        let names = rows
            .iter()
            .map(|row| mysql_text_at(row, FIELD_COLUMN).map_err(|e| DbError::scan(FIELD_COLUMN, e)))
            .collect::<DbResult<Vec<_>>>()?;

        ensure_found(table, names)
    }
}

pub(crate) mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_value;
    use sqlx::Row;
    use sqlx::postgres::PgConnection;

    const NAME_COLUMN: &str = "column_name";

    /// Query `information_schema.columns` in ordinal order.
    pub async fn field_names(
        conn: &mut PgConnection,
        table: &str,
        statement: &Statement,
    ) -> DbResult<Vec<String>> {
        // Unnamed statement; nothing stays prepared on the server
        let mut query = sqlx::query(&statement.sql).persistent(false);
        for value in &statement.args {
            query = bind_postgres_value(query, value);
        }

        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DbError::query_exec(&statement.sql, e))?;

        let names = rows
            .iter()
            .map(|row| {
                row.try_get::<String, _>(NAME_COLUMN)
                    .map_err(|e| DbError::scan(NAME_COLUMN, e))
            })
            .collect::<DbResult<Vec<_>>>()?;

        ensure_found(table, names)
    }
}
