//! Connection-related data models.
//!
//! This module defines the engine tag and the credentials a caller supplies
//! to open a session.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Includes MariaDB
    MySQL,
    PostgreSQL,
}

impl DatabaseType {
    /// All engines, in the order they are offered to callers.
    pub const ALL: [DatabaseType; 2] = [DatabaseType::MySQL, DatabaseType::PostgreSQL];

    /// Parse the engine from a URL scheme.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySQL),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            _ => None,
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySQL => "MySQL",
            Self::PostgreSQL => "PostgreSQL",
        }
    }

    /// URL scheme of the engine's native DSN.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::MySQL => "mysql",
            Self::PostgreSQL => "postgres",
        }
    }

    /// Get the default port for this database type.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySQL => 3306,
            Self::PostgreSQL => 5432,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySQL),
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSQL),
            other => Err(format!(
                "Unknown database engine '{}'. Expected one of: mysql, postgres",
                other
            )),
        }
    }
}

/// Credentials for one engine endpoint.
///
/// All fields are plain strings as collected from the caller. Every field
/// must be non-empty and the port must be numeric for a connect attempt to
/// proceed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCredentials {
    pub username: String,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub password: String,
    pub hostname: String,
    pub port: String,
    pub database: String,
}

impl ConnectionCredentials {
    /// Create a new set of credentials.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        port: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostname: hostname.into(),
            port: port.into(),
            database: database.into(),
        }
    }

    /// Check that every field is present and the port is a valid TCP port.
    pub fn validate(&self) -> Result<u16, CredentialsError> {
        let fields = [
            ("username", &self.username),
            ("password", &self.password),
            ("hostname", &self.hostname),
            ("port", &self.port),
            ("database", &self.database),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(CredentialsError::EmptyField(*name));
        }

        self.port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| CredentialsError::InvalidPort(self.port.clone()))
    }
}

// Password stays out of debug output.
impl std::fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCredentials")
            .field("username", &self.username)
            .field("password", &"****")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Errors that can occur when validating credentials.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Credential field '{0}' cannot be empty")]
    EmptyField(&'static str),

    #[error("Port must be a number between 1 and 65535, got '{0}'")]
    InvalidPort(String),
}
