//! CRUD execution.
//!
//! Each engine's executor pairs that engine's [`Dialect`] with its driver.
//! Statements are built by the dialect, then prepared, bound and executed on
//! the caller's connection.
//!
//! A prepared statement belongs to exactly one operation. After a write, and
//! after a SELECT's cursor is drained or fails, every statement the session
//! holds is closed on the server, whether or not the operation succeeded.
//! Nothing is reused across calls, so the parameter types a statement was
//! prepared with always match the values bound to it. A cursor dropped early
//! leaves its statement to be closed by the next operation.
//!
//! Writes return an [`ExecResult`]. SELECT prepares and executes before it
//! returns; only the rows are fetched lazily, through a [`RowCursor`].

use crate::db::connector::DbConnection;
use crate::db::cursor::RowCursor;
use crate::db::dialect::{Dialect, MySqlDialect, PostgresDialect, Statement};
use crate::db::params::{bind_mysql_value, bind_postgres_value, postgres_param_type};
use crate::db::schema;
use crate::db::types::RowToRecord;
use crate::error::{DbError, DbResult};
use crate::models::{ExecResult, Filter, Value};
use async_stream::try_stream;
use futures_util::TryStreamExt;
use sqlx::Statement as _;
use sqlx::database::HasStatementCache;
use sqlx::mysql::{MySqlConnection, MySqlQueryResult};
use sqlx::postgres::{PgConnection, PgQueryResult, PgTypeInfo};
use sqlx::{Connection, Executor};
use std::future::Future;
use std::time::Instant;
use tracing::debug;

/// The five data operations, for one engine.
pub trait Crud {
    /// The engine's connection type.
    type Connection: Send;
    /// The engine's SQL dialect.
    type Dialect: Dialect;

    fn dialect(&self) -> &Self::Dialect;

    /// Insert one row.
    fn insert(
        &self,
        conn: &mut Self::Connection,
        table: &str,
        columns: &[&str],
        values: &[Value],
    ) -> impl Future<Output = DbResult<ExecResult>> + Send;

    /// Select `columns` from rows matching `filter`.
    ///
    /// Prepare and execution failures are returned here, not by the cursor.
    fn select<'c>(
        &self,
        conn: &'c mut Self::Connection,
        table: &str,
        columns: &[&str],
        filter: &Filter,
    ) -> impl Future<Output = DbResult<RowCursor<'c>>> + Send;

    /// Update rows matching `filter`.
    fn update(
        &self,
        conn: &mut Self::Connection,
        table: &str,
        columns: &[&str],
        values: &[Value],
        filter: &Filter,
    ) -> impl Future<Output = DbResult<ExecResult>> + Send;

    /// Delete rows matching `filter`.
    fn delete(
        &self,
        conn: &mut Self::Connection,
        table: &str,
        filter: &Filter,
    ) -> impl Future<Output = DbResult<ExecResult>> + Send;

    /// List the column names of `table`.
    fn get_fields(
        &self,
        conn: &mut Self::Connection,
        table: &str,
    ) -> impl Future<Output = DbResult<Vec<String>>> + Send;
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn owned_columns(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// Close every statement the session still holds on the server.
async fn release_statements<C>(conn: &mut C, sql: &str) -> DbResult<()>
where
    C: Connection,
    C::Database: HasStatementCache,
{
    conn.clear_cached_statements()
        .await
        .map_err(|e| DbError::query_exec(sql, e))
}

/// Report the operation's own error first, then a failed release.
fn settle<T>(outcome: DbResult<T>, released: DbResult<()>) -> DbResult<T> {
    let value = outcome?;
    released?;
    Ok(value)
}

fn exec_result(rows_affected: u64, last_insert_id: Option<u64>, start: Instant) -> ExecResult {
    let exec = ExecResult {
        rows_affected,
        last_insert_id,
        execution_time_ms: elapsed_ms(start),
    };
    debug!(
        rows_affected = exec.rows_affected,
        execution_time_ms = exec.execution_time_ms,
        "Statement executed"
    );
    exec
}

// =============================================================================
// MySQL
// =============================================================================

/// CRUD executor for MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlCrud {
    dialect: MySqlDialect,
}

impl MySqlCrud {
    pub fn new() -> Self {
        Self::default()
    }

    async fn execute(&self, conn: &mut MySqlConnection, statement: Statement) -> DbResult<ExecResult> {
        let start = Instant::now();
        debug!(sql = %statement.sql, params = statement.args.len(), "Preparing statement");

        release_statements(conn, &statement.sql).await?;
        let outcome = Self::run(conn, &statement).await;
        let released = release_statements(conn, &statement.sql).await;
        let result = settle(outcome, released)?;

        let last_insert_id = Some(result.last_insert_id()).filter(|id| *id != 0);
        Ok(exec_result(result.rows_affected(), last_insert_id, start))
    }

    async fn run(conn: &mut MySqlConnection, statement: &Statement) -> DbResult<MySqlQueryResult> {
        let prepared = (&mut *conn)
            .prepare(&statement.sql)
            .await
            .map_err(|e| DbError::query_prepare(&statement.sql, e))?;

        let mut query = prepared.query();
        for value in &statement.args {
            query = bind_mysql_value(query, value);
        }

        query
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::query_exec(&statement.sql, e))
    }
}

impl Crud for MySqlCrud {
    type Connection = MySqlConnection;
    type Dialect = MySqlDialect;

    fn dialect(&self) -> &MySqlDialect {
        &self.dialect
    }

    async fn insert(
        &self,
        conn: &mut MySqlConnection,
        table: &str,
        columns: &[&str],
        values: &[Value],
    ) -> DbResult<ExecResult> {
        let statement = self.dialect.insert(table, columns, values)?;
        self.execute(conn, statement).await
    }

    async fn select<'c>(
        &self,
        conn: &'c mut MySqlConnection,
        table: &str,
        columns: &[&str],
        filter: &Filter,
    ) -> DbResult<RowCursor<'c>> {
        let Statement { sql, args } = self.dialect.select(table, columns, filter)?;
        debug!(sql = %sql, params = args.len(), "Opening cursor");
        release_statements(&mut *conn, &sql).await?;

        let rows = try_stream! {
            let prepared = (&mut *conn)
                .prepare(&sql)
                .await
                .map_err(|e| DbError::query_prepare(sql.as_str(), e))?;

            let mut query = prepared.query();
            for value in &args {
                query = bind_mysql_value(query, value);
            }

            let mut rows = query.fetch(&mut *conn);
            let failure = loop {
                match rows.try_next().await {
                    Ok(Some(row)) => match row.to_record() {
                        Ok(record) => yield record,
                        Err(e) => break Some(e),
                    },
                    Ok(None) => break None,
                    Err(e) => break Some(DbError::query_exec(sql.as_str(), e)),
                }
            };
            drop(rows);

            release_statements(&mut *conn, &sql).await?;
            if let Some(e) = failure {
                Err::<(), DbError>(e)?;
            }
        };

        RowCursor::open(owned_columns(columns), rows).await
    }

    async fn update(
        &self,
        conn: &mut MySqlConnection,
        table: &str,
        columns: &[&str],
        values: &[Value],
        filter: &Filter,
    ) -> DbResult<ExecResult> {
        let statement = self.dialect.update(table, columns, values, filter)?;
        self.execute(conn, statement).await
    }

    async fn delete(
        &self,
        conn: &mut MySqlConnection,
        table: &str,
        filter: &Filter,
    ) -> DbResult<ExecResult> {
        let statement = self.dialect.delete(table, filter)?;
        self.execute(conn, statement).await
    }

    async fn get_fields(&self, conn: &mut MySqlConnection, table: &str) -> DbResult<Vec<String>> {
        let statement = self.dialect.columns_statement(table)?;
        schema::mysql::field_names(conn, table, &statement).await
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// CRUD executor for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresCrud {
    dialect: PostgresDialect,
}

/// Declared parameter types, so the server does not infer narrower ones.
fn param_types(args: &[Value]) -> Vec<PgTypeInfo> {
    args.iter().map(postgres_param_type).collect()
}

impl PostgresCrud {
    pub fn new() -> Self {
        Self::default()
    }

    async fn execute(&self, conn: &mut PgConnection, statement: Statement) -> DbResult<ExecResult> {
        let start = Instant::now();
        debug!(sql = %statement.sql, params = statement.args.len(), "Preparing statement");

        release_statements(conn, &statement.sql).await?;
        let outcome = Self::run(conn, &statement).await;
        let released = release_statements(conn, &statement.sql).await;
        let result = settle(outcome, released)?;

        Ok(exec_result(result.rows_affected(), None, start))
    }

    async fn run(conn: &mut PgConnection, statement: &Statement) -> DbResult<PgQueryResult> {
        let types = param_types(&statement.args);
        let prepared = (&mut *conn)
            .prepare_with(&statement.sql, &types)
            .await
            .map_err(|e| DbError::query_prepare(&statement.sql, e))?;

        let mut query = prepared.query();
        for value in &statement.args {
            query = bind_postgres_value(query, value);
        }

        query
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::query_exec(&statement.sql, e))
    }
}

impl Crud for PostgresCrud {
    type Connection = PgConnection;
    type Dialect = PostgresDialect;

    fn dialect(&self) -> &PostgresDialect {
        &self.dialect
    }

    async fn insert(
        &self,
        conn: &mut PgConnection,
        table: &str,
        columns: &[&str],
        values: &[Value],
    ) -> DbResult<ExecResult> {
        let statement = self.dialect.insert(table, columns, values)?;
        self.execute(conn, statement).await
    }

    async fn select<'c>(
        &self,
        conn: &'c mut PgConnection,
        table: &str,
        columns: &[&str],
        filter: &Filter,
    ) -> DbResult<RowCursor<'c>> {
        let Statement { sql, args } = self.dialect.select(table, columns, filter)?;
        debug!(sql = %sql, params = args.len(), "Opening cursor");
        release_statements(&mut *conn, &sql).await?;

        let rows = try_stream! {
            let types = param_types(&args);
            let prepared = (&mut *conn)
                .prepare_with(&sql, &types)
                .await
                .map_err(|e| DbError::query_prepare(sql.as_str(), e))?;

            let mut query = prepared.query();
            for value in &args {
                query = bind_postgres_value(query, value);
            }

            let mut rows = query.fetch(&mut *conn);
            let failure = loop {
                match rows.try_next().await {
                    Ok(Some(row)) => match row.to_record() {
                        Ok(record) => yield record,
                        Err(e) => break Some(e),
                    },
                    Ok(None) => break None,
                    Err(e) => break Some(DbError::query_exec(sql.as_str(), e)),
                }
            };
            drop(rows);

            release_statements(&mut *conn, &sql).await?;
            if let Some(e) = failure {
                Err::<(), DbError>(e)?;
            }
        };

        RowCursor::open(owned_columns(columns), rows).await
    }

    async fn update(
        &self,
        conn: &mut PgConnection,
        table: &str,
        columns: &[&str],
        values: &[Value],
        filter: &Filter,
    ) -> DbResult<ExecResult> {
        let statement = self.dialect.update(table, columns, values, filter)?;
        self.execute(conn, statement).await
    }

    async fn delete(
        &self,
        conn: &mut PgConnection,
        table: &str,
        filter: &Filter,
    ) -> DbResult<ExecResult> {
        let statement = self.dialect.delete(table, filter)?;
        self.execute(conn, statement).await
    }

    async fn get_fields(&self, conn: &mut PgConnection, table: &str) -> DbResult<Vec<String>> {
        let statement = self.dialect.columns_statement(table)?;
        schema::postgres::field_names(conn, table, &statement).await
    }
}

// =============================================================================
// Engine-agnostic facade
// =============================================================================

static MYSQL: MySqlCrud = MySqlCrud {
    dialect: MySqlDialect,
};
static POSTGRES: PostgresCrud = PostgresCrud {
    dialect: PostgresDialect,
};

impl DbConnection {
    /// The SQL dialect of this connection's engine.
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            DbConnection::MySql(_) => &MYSQL.dialect,
            DbConnection::Postgres(_) => &POSTGRES.dialect,
        }
    }

    /// Insert one row; `columns` and `values` pair up positionally.
    pub async fn insert(
        &mut self,
        table: &str,
        columns: &[&str],
        values: &[Value],
    ) -> DbResult<ExecResult> {
        impl_db_dispatch!(self, {
            MySql(c) => MYSQL.insert(c, table, columns, values).await,
            Postgres(c) => POSTGRES.insert(c, table, columns, values).await,
        })
    }

    /// Select `columns` from `table` where `filter` holds.
    ///
    /// The statement has run by the time this returns; the cursor only
    /// fetches rows.
    pub async fn select<'c>(
        &'c mut self,
        table: &str,
        columns: &[&str],
        filter: &Filter,
    ) -> DbResult<RowCursor<'c>> {
        impl_db_dispatch!(self, {
            MySql(c) => MYSQL.select(c, table, columns, filter).await,
            Postgres(c) => POSTGRES.select(c, table, columns, filter).await,
        })
    }

    /// Update `columns` to `values` on rows where `filter` holds.
    ///
    /// On PostgreSQL the filter's own placeholders must be numbered after the
    /// SET values, starting at `$<columns.len() + 1>`.
    pub async fn update(
        &mut self,
        table: &str,
        columns: &[&str],
        values: &[Value],
        filter: &Filter,
    ) -> DbResult<ExecResult> {
        impl_db_dispatch!(self, {
            MySql(c) => MYSQL.update(c, table, columns, values, filter).await,
            Postgres(c) => POSTGRES.update(c, table, columns, values, filter).await,
        })
    }

    /// Delete rows where `filter` holds.
    pub async fn delete(&mut self, table: &str, filter: &Filter) -> DbResult<ExecResult> {
        impl_db_dispatch!(self, {
            MySql(c) => MYSQL.delete(c, table, filter).await,
            Postgres(c) => POSTGRES.delete(c, table, filter).await,
        })
    }

    /// Column names of `table`, in the catalog's order.
    pub async fn get_fields(&mut self, table: &str) -> DbResult<Vec<String>> {
        impl_db_dispatch!(self, {
            MySql(c) => MYSQL.get_fields(c, table).await,
            Postgres(c) => POSTGRES.get_fields(c, table).await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatabaseType;
    use sqlx::TypeInfo;

    #[test]
    fn test_crud_dialects() {
        assert_eq!(MySqlCrud::new().dialect().db_type(), DatabaseType::MySQL);
        assert_eq!(PostgresCrud::new().dialect().db_type(), DatabaseType::PostgreSQL);
    }

    #[test]
    fn test_param_types_follow_values() {
        let types = param_types(&[Value::Int(1), Value::from("Ann"), Value::Bool(false)]);
        let names: Vec<_> = types.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["INT8", "TEXT", "BOOL"]);
    }

    #[test]
    fn test_param_types_are_per_call() {
        // Same statement shape, different values: nothing carries over
        let first = param_types(&[Value::Int(1), Value::Null]);
        let second = param_types(&[Value::Int(2), Value::Int(30)]);
        assert_ne!(first[1], second[1]);
        assert_eq!(second[1].name(), "INT8");
    }

    #[test]
    fn test_settle_prefers_operation_error() {
        let err = settle::<u64>(
            Err(DbError::precondition("operation")),
            Err(DbError::precondition("release")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("operation"));

        let err = settle(Ok(1_u64), Err(DbError::precondition("release"))).unwrap_err();
        assert!(err.to_string().contains("release"));
        assert_eq!(tokio_test::assert_ok!(settle(Ok(1_u64), Ok(()))), 1);
    }

    #[test]
    fn test_elapsed_ms_is_small() {
        assert!(elapsed_ms(Instant::now()) < 1_000);
    }
}
