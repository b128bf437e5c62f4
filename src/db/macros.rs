//! Engine dispatch macros.
//!
//! The macro expands to a plain `match` over [`DbConnection`] variants, so
//! each arm is monomorphic and reads linearly.
//!
//! [`DbConnection`]: crate::db::connector::DbConnection

/// Macro for generating engine dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(conn, {
///     MySql(c) => do_mysql(c),
///     Postgres(c) => do_postgres(c),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::connector::DbConnection::$variant($c) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
