//! Parameter binding utilities for database queries.
//!
//! This module binds [`Value`]s to engine-specific query objects, and derives
//! the PostgreSQL parameter types a statement is prepared with.

use crate::models::Value;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArguments, PgTypeInfo};
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Type};

/// Bind a value to a MySQL query.
pub(crate) fn bind_mysql_value<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::UInt(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Decimal(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Json(v) => query.bind(Json(v)),
        // MySQL has no native UUID type; CHAR(36) is the common column shape
        Value::Uuid(v) => query.bind(v.hyphenated().to_string()),
        Value::Date(v) => query.bind(*v),
        Value::Time(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
        Value::TimestampTz(v) => query.bind(*v),
    }
}

/// Bind a value to a PostgreSQL query.
pub(crate) fn bind_postgres_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        // PostgreSQL has no unsigned 64-bit type; oversized values go as NUMERIC
        Value::UInt(v) => match i64::try_from(*v) {
            Ok(i) => query.bind(i),
            Err(_) => query.bind(rust_decimal::Decimal::from(*v)),
        },
        Value::Float(v) => query.bind(*v),
        Value::Decimal(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Json(v) => query.bind(Json(v)),
        Value::Uuid(v) => query.bind(*v),
        Value::Date(v) => query.bind(*v),
        Value::Time(v) => query.bind(*v),
        Value::Timestamp(v) => query.bind(*v),
        Value::TimestampTz(v) => query.bind(*v),
    }
}

/// Parameter type a PostgreSQL statement is prepared with for `value`.
///
/// Must agree with the encoding chosen by [`bind_postgres_value`]. NULL is
/// left unspecified (OID 0) so the server infers it from context.
pub(crate) fn postgres_param_type(value: &Value) -> PgTypeInfo {
    match value {
        Value::Null => PgTypeInfo::with_oid(Oid(0)),
        Value::Bool(_) => <bool as Type<Postgres>>::type_info(),
        Value::Int(_) => <i64 as Type<Postgres>>::type_info(),
        Value::UInt(v) => match i64::try_from(*v) {
            Ok(_) => <i64 as Type<Postgres>>::type_info(),
            Err(_) => <rust_decimal::Decimal as Type<Postgres>>::type_info(),
        },
        Value::Float(_) => <f64 as Type<Postgres>>::type_info(),
        Value::Decimal(_) => <rust_decimal::Decimal as Type<Postgres>>::type_info(),
        Value::Text(_) => <String as Type<Postgres>>::type_info(),
        Value::Bytes(_) => <Vec<u8> as Type<Postgres>>::type_info(),
        Value::Json(_) => <Json<serde_json::Value> as Type<Postgres>>::type_info(),
        Value::Uuid(_) => <uuid::Uuid as Type<Postgres>>::type_info(),
        Value::Date(_) => <chrono::NaiveDate as Type<Postgres>>::type_info(),
        Value::Time(_) => <chrono::NaiveTime as Type<Postgres>>::type_info(),
        Value::Timestamp(_) => <chrono::NaiveDateTime as Type<Postgres>>::type_info(),
        Value::TimestampTz(_) => {
            <chrono::DateTime<chrono::Utc> as Type<Postgres>>::type_info()
        }
    }
}
