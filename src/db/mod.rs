//! Database abstraction layer.
//!
//! This module provides:
//! - Connection establishment per engine
//! - SQL dialects and identifier validation
//! - CRUD execution and row cursors
//! - Column introspection
//! - Parameter binding and row decoding
//! - Engine dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod connector;
pub mod crud;
pub mod cursor;
pub mod dialect;
pub mod identifier;
pub mod params;
pub mod schema;
pub mod types;

pub use connector::{
    Connector, DbConnection, MySqlConnector, PostgresConnector, connect, masked_dsn,
};
pub use crud::{Crud, MySqlCrud, PostgresCrud};
pub use cursor::RowCursor;
pub use dialect::{Dialect, MySqlDialect, PostgresDialect, Statement};
pub use identifier::{MAX_IDENTIFIER_LENGTH, validate_identifier, validate_table_name};
pub use types::{RowToRecord, TypeCategory, categorize_type};
