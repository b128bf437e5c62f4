//! Connection establishment.
//!
//! Each engine has its own connector that builds a DSN in that engine's
//! native URL grammar, opens a session with that engine's sqlx driver, and
//! pings it before handing it out. A session that opens but does not answer
//! the ping is reported as [`ConnectionErrorKind::PingFailed`] and dropped.
//!
//! There is no pooling and no retry: one attempt, one session, owned by the
//! caller until [`DbConnection::close`] (or drop).

use crate::error::{ConnectionErrorKind, DbError, DbResult};
use crate::models::{ConnectionCredentials, DatabaseType};
use sqlx::Connection;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, info, warn};
use url::Url;

/// Opens verified sessions to one engine.
pub trait Connector {
    /// The live session type produced by this connector.
    type Connection: Send;

    /// The engine this connector speaks to.
    fn db_type(&self) -> DatabaseType;

    /// Build the engine's DSN from validated credentials.
    fn dsn(&self, credentials: &ConnectionCredentials) -> DbResult<Url>;

    /// Open a session and verify it answers a ping.
    fn connect(
        &self,
        credentials: &ConnectionCredentials,
    ) -> impl Future<Output = DbResult<Self::Connection>> + Send;
}

/// Connector for MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl Connector for MySqlConnector {
    type Connection = MySqlConnection;

    fn db_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn dsn(&self, credentials: &ConnectionCredentials) -> DbResult<Url> {
        url_dsn(DatabaseType::MySQL, credentials)
    }

    async fn connect(&self, credentials: &ConnectionCredentials) -> DbResult<MySqlConnection> {
        let dsn = self.dsn(credentials)?;
        let masked = masked_dsn(&dsn);
        let engine = self.db_type();

        let options = MySqlConnectOptions::from_str(dsn.as_str())
            .map_err(|e| DbError::connection(ConnectionErrorKind::OpenFailed, engine, e))?
            .charset("utf8mb4");

        debug!(dsn = %masked, "Opening connection");
        let mut conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| open_failed(engine, &masked, e))?;

        if let Err(e) = conn.ping().await {
            return Err(ping_failed(engine, &masked, e));
        }

        info!(db_type = %engine, dsn = %masked, "Connected successfully");
        Ok(conn)
    }
}

/// Connector for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

impl Connector for PostgresConnector {
    type Connection = PgConnection;

    fn db_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn dsn(&self, credentials: &ConnectionCredentials) -> DbResult<Url> {
        url_dsn(DatabaseType::PostgreSQL, credentials)
    }

    async fn connect(&self, credentials: &ConnectionCredentials) -> DbResult<PgConnection> {
        let dsn = self.dsn(credentials)?;
        let masked = masked_dsn(&dsn);
        let engine = self.db_type();

        let options = PgConnectOptions::from_str(dsn.as_str())
            .map_err(|e| DbError::connection(ConnectionErrorKind::OpenFailed, engine, e))?
            .application_name(env!("CARGO_PKG_NAME"));

        debug!(dsn = %masked, "Opening connection");
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| open_failed(engine, &masked, e))?;

        if let Err(e) = conn.ping().await {
            return Err(ping_failed(engine, &masked, e));
        }

        info!(db_type = %engine, dsn = %masked, "Connected successfully");
        Ok(conn)
    }
}

fn open_failed(engine: DatabaseType, masked: &str, e: sqlx::Error) -> DbError {
    warn!(db_type = %engine, dsn = %masked, error = %e, "Could not open connection");
    DbError::connection(ConnectionErrorKind::OpenFailed, engine, e)
}

fn ping_failed(engine: DatabaseType, masked: &str, e: sqlx::Error) -> DbError {
    warn!(db_type = %engine, dsn = %masked, error = %e, "Connection did not answer ping");
    DbError::connection(ConnectionErrorKind::PingFailed, engine, e)
}

/// Build `<scheme>://user:pass@host:port/database` with every part percent-encoded.
pub fn url_dsn(engine: DatabaseType, credentials: &ConnectionCredentials) -> DbResult<Url> {
    let port = credentials.validate()?;

    let mut url = Url::parse(&format!("{}://localhost", engine.scheme()))
        .map_err(|e| DbError::invalid_input(format!("Invalid DSN scheme: {e}")))?;

    let host = credentials.hostname.trim();
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    url.set_host(Some(&host))
        .map_err(|e| DbError::invalid_input(format!("Invalid hostname '{}': {e}", host)))?;
    url.set_port(Some(port))
        .map_err(|_| DbError::invalid_input("Cannot set port on DSN"))?;
    url.set_username(&credentials.username)
        .map_err(|_| DbError::invalid_input("Cannot set username on DSN"))?;
    url.set_password(Some(&credentials.password))
        .map_err(|_| DbError::invalid_input("Cannot set password on DSN"))?;
    url.path_segments_mut()
        .map_err(|_| DbError::invalid_input("Cannot set database on DSN"))?
        .push(&credentials.database);

    Ok(url)
}

/// Get a display-safe version of a DSN (password masked).
pub fn masked_dsn(dsn: &Url) -> String {
    let mut masked = dsn.clone();
    if masked.password().is_some() {
        // Cannot fail: the URL already carries credentials
        let _ = masked.set_password(Some("****"));
    }
    masked.to_string()
}

/// A live session to one of the supported engines.
///
/// Selected by engine tag through [`connect`]; the CRUD operations on it
/// dispatch to the matching engine's executor.
#[derive(Debug)]
pub enum DbConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

impl DbConnection {
    /// Get the database type for this connection.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbConnection::MySql(_) => DatabaseType::MySQL,
            DbConnection::Postgres(_) => DatabaseType::PostgreSQL,
        }
    }

    /// Check the session is still alive.
    pub async fn ping(&mut self) -> DbResult<()> {
        let engine = self.db_type();
        let result = impl_db_dispatch!(self, {
            MySql(c) => c.ping().await,
            Postgres(c) => c.ping().await,
        });
        result.map_err(|e| DbError::connection(ConnectionErrorKind::PingFailed, engine, e))
    }

    /// Get the server version string.
    pub async fn server_version(&mut self) -> DbResult<String> {
        const SQL: &str = "SELECT version()";
        let result = impl_db_dispatch!(self, {
            MySql(c) => sqlx::query_scalar::<_, String>(SQL)
                .persistent(false)
                .fetch_one(c)
                .await,
            Postgres(c) => sqlx::query_scalar::<_, String>(SQL)
                .persistent(false)
                .fetch_one(c)
                .await,
        });
        let version = result.map_err(|e| DbError::query_exec(SQL, e))?;
        debug!(version = %version, "Got server version");
        Ok(version)
    }

    /// Release the session.
    pub async fn close(self) {
        let engine = self.db_type();
        let result = match self {
            DbConnection::MySql(c) => c.close().await,
            DbConnection::Postgres(c) => c.close().await,
        };
        match result {
            Ok(()) => info!(db_type = %engine, "Connection closed"),
            Err(e) => warn!(db_type = %engine, error = %e, "Connection closed with error"),
        }
    }
}

/// Connect to the engine selected by `engine`.
pub async fn connect(
    engine: DatabaseType,
    credentials: &ConnectionCredentials,
) -> DbResult<DbConnection> {
    match engine {
        DatabaseType::MySQL => MySqlConnector
            .connect(credentials)
            .await
            .map(DbConnection::MySql),
        DatabaseType::PostgreSQL => PostgresConnector
            .connect(credentials)
            .await
            .map(DbConnection::Postgres),
    }
}
