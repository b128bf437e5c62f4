//! Error types for sql-bridge.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Driver failures are wrapped, never flattened, so callers can inspect the
//! underlying `sqlx::Error` through `std::error::Error::source`.

use crate::models::{CredentialsError, DatabaseType};
use thiserror::Error;

/// Which step of establishing a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The DSN was rejected or the session could not be opened.
    OpenFailed,
    /// The session opened but did not answer the liveness check.
    PingFailed,
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenFailed => write!(f, "could not open db"),
            Self::PingFailed => write!(f, "could not connect to db"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed ({engine}): {kind}: {source}")]
    Connection {
        kind: ConnectionErrorKind,
        engine: DatabaseType,
        #[source]
        source: sqlx::Error,
        suggestion: String,
    },

    #[error("Could not prepare query: {source}")]
    QueryPrepare {
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Could not execute query: {source}")]
    QueryExec {
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Could not scan column '{column}': {source}")]
    Scan {
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Invalid identifier {identifier:?}: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },
}

impl DbError {
    /// Create a connection error with a suggestion derived from the driver message.
    pub fn connection(kind: ConnectionErrorKind, engine: DatabaseType, source: sqlx::Error) -> Self {
        let suggestion = connection_suggestion(engine, &source);
        Self::Connection {
            kind,
            engine,
            source,
            suggestion,
        }
    }

    /// Create a statement preparation error.
    pub fn query_prepare(sql: impl Into<String>, source: sqlx::Error) -> Self {
        Self::QueryPrepare {
            sql: sql.into(),
            source,
        }
    }

    /// Create a statement execution error.
    pub fn query_exec(sql: impl Into<String>, source: sqlx::Error) -> Self {
        Self::QueryExec {
            sql: sql.into(),
            source,
        }
    }

    /// Create a row decoding error.
    pub fn scan(column: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Scan {
            column: column.into(),
            source,
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Connection failure kind, if this is a connection error.
    pub fn connection_kind(&self) -> Option<ConnectionErrorKind> {
        match self {
            Self::Connection { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// SQLSTATE / vendor code reported by the engine, if any.
    pub fn sql_state(&self) -> Option<String> {
        let source = match self {
            Self::Connection { source, .. }
            | Self::QueryPrepare { source, .. }
            | Self::QueryExec { source, .. }
            | Self::Scan { source, .. } => source,
            _ => return None,
        };
        match source {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.to_string()),
            _ => None,
        }
    }

    /// True for errors raised before any statement reached the engine.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Precondition { .. } | Self::InvalidIdentifier { .. } | Self::InvalidInput { .. }
        )
    }
}

impl From<CredentialsError> for DbError {
    fn from(err: CredentialsError) -> Self {
        DbError::invalid_input(err.to_string())
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(engine: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", engine);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or build with a TLS feature".to_string();
    }

    format!(
        "Verify host and port: {} listens on {} by default",
        engine,
        engine.default_port()
    )
}
