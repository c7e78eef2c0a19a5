//! Typed entities mapped onto [`Record`]s.
//!
//! An [`Entity`] names its table and converts to and from a record. The
//! mapping is fixed at compile time, usually by `#[derive(Entity)]`:
//!
//! ```ignore
//! use sqlrow::Entity;
//!
//! #[derive(Entity)]
//! #[orm(table = "users")]
//! struct User {
//!     id: Option<i64>,
//!     #[orm(column = "email")]
//!     address: String,
//!     name: Option<String>,
//!     #[orm(skip)]
//!     cached_rank: u32,
//! }
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::schema::SchemaCatalog;
use crate::value::{Record, Value};

/// Conversion from a cell value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

/// A struct bound to one table.
pub trait Entity: Sized {
    /// Table name
    const TABLE: &'static str;

    /// Mapped column names, in field order.
    fn columns() -> &'static [&'static str];

    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> OrmResult<Self>;
}

/// Read `column` from `record`. A missing column decodes like NULL.
pub fn decode<T: FromValue>(record: &Record, column: &str) -> OrmResult<T> {
    let value = record.get(column).unwrap_or(&Value::Null);
    T::from_value(value).map_err(|message| OrmError::decode(column, message))
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {expected}, found {value:?}")
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => other
                .as_i64()
                .map(|v| v != 0)
                .ok_or_else(|| mismatch("boolean", other)),
        }
    }
}

macro_rules! from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self, String> {
                    let wide = match value {
                        Value::UInt(v) => i128::from(*v),
                        other => i128::from(
                            other
                                .as_i64()
                                .ok_or_else(|| mismatch(stringify!($t), other))?,
                        ),
                    };
                    <$t>::try_from(wide).map_err(|_| format!("{wide} is out of range for {}", stringify!($t)))
                }
            }
        )*
    };
}

from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        value.as_f64().ok_or_else(|| mismatch("float", value))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Err(mismatch("text", value)),
            Value::Bytes(bytes) => String::from_utf8(bytes.clone()).map_err(|e| e.to_string()),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch("bytes", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Text(s) => NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|e| e.to_string()),
            other => Err(mismatch("time", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::Text(s) => {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map_err(|e| e.to_string())
            }
            other => Err(mismatch("datetime", other)),
        }
    }
}

impl Row {
    /// A new row seeded with the entity's fields.
    pub fn from_entity<T: Entity>(catalog: Arc<SchemaCatalog>, entity: &T) -> OrmResult<Self> {
        Self::new(catalog, T::TABLE, entity.to_record())
    }

    /// Decode the merged view of the row.
    pub fn to_entity<T: Entity>(&self) -> OrmResult<T> {
        if T::TABLE != self.table() {
            return Err(OrmError::Other(format!(
                "entity table '{}' does not match row table '{}'",
                T::TABLE,
                self.table()
            )));
        }
        T::from_record(&self.export())
    }
}
