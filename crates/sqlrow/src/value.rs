//! Cell values, records and named bindings.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// A single cell or binding value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact decimal kept in its textual form.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view, accepting numeric text as drivers often return it.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) | Self::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            Self::Text(s) | Self::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            Self::Text(s) | Self::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The empty string, which form-style input uses for "no value".
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }

    /// Loose equality used for dirty tracking: `Int(5)` equals `UInt(5)` and `Text("5")`.
    pub fn same_as(&self, other: &Value) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Int(_) | Self::UInt(_) | Self::Bool(_), _)
            | (_, Self::Int(_) | Self::UInt(_) | Self::Bool(_)) => {
                matches!((self.as_i64(), other.as_i64()), (Some(a), Some(b)) if a == b)
            }
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(s) | Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident: $target:ty => $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

impl_from_int!(Int: i64 => i8, i16, i32, i64);
impl_from_int!(UInt: u64 => u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One row: column name → value, in deterministic column-name order.
pub type Record = BTreeMap<String, Value>;

/// Build a [`Record`] from `column => value` pairs.
///
/// ```
/// let r = sqlrow::record! { "email" => "a@b.c", "age" => 30 };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert(::std::string::String::from($column), $crate::Value::from($value)); )+
        record
    }};
}

/// Named parameter values for one statement, keyed by label (without the `:`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a binding, returning the previous value for that label.
    pub fn insert(&mut self, label: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(label.into(), value)
    }

    /// Insert a binding, failing if the label is already bound to a different value.
    pub fn bind(&mut self, label: &str, value: Value) -> OrmResult<()> {
        match self.values.get(label) {
            Some(existing) if *existing != value => {
                Err(OrmError::DuplicateBinding(label.to_string()))
            }
            Some(_) => Ok(()),
            None => {
                self.values.insert(label.to_string(), value);
                Ok(())
            }
        }
    }

    /// Merge another binding set into this one. Colliding labels must agree.
    pub fn merge(&mut self, other: &Bindings) -> OrmResult<()> {
        for (label, value) in &other.values {
            self.bind(label, value.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.values.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.values.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
