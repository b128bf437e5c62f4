//! sql-bridge Library
//!
//! A dialect-abstracted connection and CRUD layer for moving data between
//! MySQL and PostgreSQL. Each engine gets its own connector and dialect; the
//! [`db::DbConnection`] handle dispatches to whichever engine it was opened
//! against.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{DbConnection, connect};
pub use error::{DbError, DbResult};
pub use models::{ConnectionCredentials, DatabaseType, ExecResult, Filter, Record, Value};
