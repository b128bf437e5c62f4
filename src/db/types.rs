//! Row decoding.
//!
//! This module maps engine-specific column types onto [`Value`].
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! A value that cannot be decoded is a [`DbError::Scan`], never a silent NULL.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Record, Value};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind};
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Array,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // PostgreSQL arrays; "text[]" must not land in Text
    if lower.ends_with("[]") {
        return TypeCategory::Array;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    // Temporal types - before integers and text, "datetime" contains "time"
    if lower == "timestamptz" {
        return TypeCategory::TimestampTz;
    }
    if lower.starts_with("timestamp") || lower == "datetime" {
        return TypeCategory::Timestamp;
    }
    if lower == "date" {
        return TypeCategory::Date;
    }
    if lower == "time" {
        return TypeCategory::Time;
    }

    // Boolean - MySQL reports TINYINT(1) as BOOLEAN
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // Integer types; MySQL appends " UNSIGNED", and "point"/"interval" must not match
    let base = lower.split_whitespace().next().unwrap_or_default();
    if matches!(
        base,
        "tinyint"
            | "smallint"
            | "mediumint"
            | "int"
            | "integer"
            | "bigint"
            | "int2"
            | "int4"
            | "int8"
            | "smallserial"
            | "serial"
            | "bigserial"
    ) {
        return TypeCategory::Integer;
    }

    // Float types
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // UUID (PostgreSQL)
    if lower == "uuid" && db == DatabaseType::PostgreSQL {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw MySQL DECIMAL text, for values outside `rust_decimal`'s range.
///
/// MySQL sends DECIMAL as text even over the binary protocol.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row to Record Trait
// =============================================================================

/// Trait for converting database rows to records.
pub trait RowToRecord {
    /// Decode every column, in projection order.
    fn to_record(&self) -> DbResult<Record>;
}

impl RowToRecord for MySqlRow {
    fn to_record(&self) -> DbResult<Record> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::MySQL);
                mysql::decode_column(self, idx, type_name, category)
                    .map_err(|e| DbError::scan(col.name(), e))
            })
            .collect()
    }
}

impl RowToRecord for PgRow {
    fn to_record(&self) -> DbResult<Record> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let info = col.type_info();
                let category = match info.kind() {
                    PgTypeKind::Array(_) => TypeCategory::Array,
                    _ => categorize_type(info.name(), DatabaseType::PostgreSQL),
                };
                postgres::decode_column(self, idx, info, category)
                    .map_err(|e| DbError::scan(col.name(), e))
            })
            .collect()
    }
}

/// Decode a text column, accepting binary-collated strings as UTF-8.
///
/// MySQL reports several metadata columns (and `*_bin` collations) as binary.
pub(crate) fn mysql_text_at<I>(row: &MySqlRow, idx: I) -> Result<String, sqlx::Error>
where
    I: ColumnIndex<MySqlRow> + Copy,
{
    match row.try_get::<String, _>(idx) {
        Ok(v) => Ok(v),
        Err(text_err) => {
            let bytes = row.try_get::<Vec<u8>, _>(idx).map_err(|_| text_err)?;
            String::from_utf8(bytes).map_err(|e| sqlx::Error::Decode(Box::new(e)))
        }
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(Value::Null);
        }

        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx, type_name),
            TypeCategory::Boolean => Ok(Value::Bool(row.try_get(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(Value::Bytes(row.try_get(idx)?)),
            TypeCategory::Json => Ok(Value::Json(row.try_get(idx)?)),
            TypeCategory::Date => Ok(Value::Date(row.try_get(idx)?)),
            TypeCategory::Time => Ok(Value::Time(row.try_get(idx)?)),
            TypeCategory::Timestamp | TypeCategory::TimestampTz => {
                Ok(Value::Timestamp(row.try_get(idx)?))
            }
            TypeCategory::Text | TypeCategory::Uuid => Ok(Value::Text(mysql_text_at(row, idx)?)),
            TypeCategory::Array | TypeCategory::Unknown => decode_unknown(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        match row.try_get::<rust_decimal::Decimal, _>(idx) {
            Ok(v) => Ok(Value::Decimal(v)),
            Err(_) => Ok(Value::Text(row.try_get::<RawDecimal, _>(idx)?.0)),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
        if type_name.to_uppercase().contains("UNSIGNED") {
            return Ok(Value::from(row.try_get::<u64, _>(idx)?));
        }
        Ok(Value::Int(row.try_get::<i64, _>(idx)?))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        match row.try_get::<f64, _>(idx) {
            Ok(v) => Ok(Value::Float(v)),
            Err(_) => Ok(Value::Float(row.try_get::<f32, _>(idx)? as f64)),
        }
    }

    // ENUM, SET, YEAR, BIT and friends
    fn decode_unknown(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = mysql_text_at(row, idx) {
            return Ok(Value::Text(v));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Ok(Value::Int(v));
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return Ok(Value::from(v));
        }
        Ok(Value::Bytes(row.try_get::<Vec<u8>, _>(idx)?))
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::types::{PgInterval, PgMoney};
    use sqlx::types::ipnetwork::IpNetwork;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        info: &PgTypeInfo,
        category: TypeCategory,
    ) -> Result<Value, sqlx::Error> {
        if row.try_get_raw(idx)?.is_null() {
            return Ok(Value::Null);
        }

        match category {
            TypeCategory::Decimal => Ok(Value::Decimal(row.try_get(idx)?)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => Ok(Value::Bool(row.try_get(idx)?)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => Ok(Value::Bytes(row.try_get(idx)?)),
            TypeCategory::Json => Ok(Value::Json(row.try_get(idx)?)),
            TypeCategory::Uuid => Ok(Value::Uuid(row.try_get(idx)?)),
            TypeCategory::Date => Ok(Value::Date(row.try_get(idx)?)),
            TypeCategory::Time => Ok(Value::Time(row.try_get(idx)?)),
            TypeCategory::Timestamp => Ok(Value::Timestamp(row.try_get(idx)?)),
            TypeCategory::TimestampTz => Ok(Value::TimestampTz(row.try_get(idx)?)),
            TypeCategory::Array => decode_array(row, idx, info),
            TypeCategory::Text => match row.try_get(idx) {
                Ok(v) => Ok(Value::Text(v)),
                Err(_) => decode_unknown(row, idx, info),
            },
            TypeCategory::Unknown => decode_unknown(row, idx, info),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Ok(Value::Int(v.into()));
        }
        Ok(Value::Int(row.try_get::<i64, _>(idx)?))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        match row.try_get::<f64, _>(idx) {
            Ok(v) => Ok(Value::Float(v)),
            Err(_) => Ok(Value::Float(row.try_get::<f32, _>(idx)?.into())),
        }
    }

    // Enums, domains, network types, INTERVAL, MONEY and anything else
    fn decode_unknown(row: &PgRow, idx: usize, info: &PgTypeInfo) -> Result<Value, sqlx::Error> {
        match info.kind() {
            // Enum labels are sent as plain text even in binary format
            PgTypeKind::Enum(_) => return Ok(Value::Text(row.try_get_unchecked(idx)?)),
            PgTypeKind::Domain(base) => {
                if categorize_type(base.name(), DatabaseType::PostgreSQL) == TypeCategory::Text {
                    return Ok(Value::Text(row.try_get_unchecked(idx)?));
                }
            }
            _ => {}
        }

        match info.name() {
            "INET" | "CIDR" => {
                let net = row.try_get::<IpNetwork, _>(idx)?;
                return Ok(Value::Text(network_text(&net, info.name() == "CIDR")));
            }
            "INTERVAL" => {
                let interval = row.try_get::<PgInterval, _>(idx)?;
                return Ok(Value::Text(interval_text(&interval)));
            }
            "MONEY" => {
                let money = row.try_get::<PgMoney, _>(idx)?;
                return Ok(Value::Decimal(money.to_decimal(MONEY_SCALE)));
            }
            _ => {}
        }

        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Ok(Value::Text(v));
        }

        // Last resort: the value exactly as the server sent it
        let raw = row.try_get_raw(idx)?;
        let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
        Ok(Value::Bytes(bytes.to_vec()))
    }

    /// Arrays come back as a JSON array of their elements.
    fn decode_array(row: &PgRow, idx: usize, info: &PgTypeInfo) -> Result<Value, sqlx::Error> {
        macro_rules! try_array {
            ($($ty:ty),+ $(,)?) => {
                $(
                    if let Ok(v) = row.try_get::<Vec<Option<$ty>>, _>(idx) {
                        return to_json(v);
                    }
                )+
            };
        }

        if let PgTypeKind::Array(element) = info.kind() {
            if matches!(element.kind(), PgTypeKind::Enum(_)) {
                return to_json(row.try_get_unchecked::<Vec<Option<String>>, _>(idx)?);
            }
        }

        try_array!(
            String,
            i64,
            i32,
            i16,
            f64,
            f32,
            bool,
            uuid::Uuid,
            chrono::NaiveDate,
            chrono::NaiveTime,
            chrono::NaiveDateTime,
            chrono::DateTime<chrono::Utc>,
        );

        let nets = row.try_get::<Vec<Option<IpNetwork>>, _>(idx)?;
        let texts: Vec<_> = nets
            .iter()
            .map(|n| n.as_ref().map(|n| network_text(n, info.name() == "CIDR[]")))
            .collect();
        to_json(texts)
    }

    fn to_json<T: serde::Serialize>(v: T) -> Result<Value, sqlx::Error> {
        serde_json::to_value(v)
            .map(Value::Json)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }
}

/// Fractional digits of MONEY under the default `lc_monetary`.
const MONEY_SCALE: u32 = 2;

/// Render an address the way PostgreSQL prints it: host addresses in an
/// INET column drop their full-length prefix, CIDR values always keep it.
fn network_text(net: &sqlx::types::ipnetwork::IpNetwork, is_cidr: bool) -> String {
    let full = if net.is_ipv4() { 32 } else { 128 };
    if !is_cidr && net.prefix() == full {
        net.ip().to_string()
    } else {
        net.to_string()
    }
}

/// Render an INTERVAL in PostgreSQL's default output style,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn interval_text(interval: &sqlx::postgres::types::PgInterval) -> String {
    fn unit(n: i32, name: &str) -> String {
        if n == 1 || n == -1 {
            format!("{n} {name}")
        } else {
            format!("{n} {name}s")
        }
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if months != 0 {
        parts.push(unit(months, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days, "day"));
    }
    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            clock.push('.');
            clock.push_str(format!("{frac:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}
