//! Data models for sql-bridge.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionCredentials, CredentialsError, DatabaseType};
pub use query::{ExecResult, Filter, Record, Value};
