//! Column attributes: semantic type classification, typed defaults and
//! per-column value checks.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::validation::{ValidationCode, ValidationError};
use crate::value::Value;

/// Semantic type of a column, derived once from the raw engine type string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum SemanticType {
    Boolean,
    Integer,
    Float,
    Decimal,
    String,
    Text,
    Enum(Vec<String>),
    /// Comma-separated subset of the members.
    Set(Vec<String>),
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Binary,
    Json,
}

#[derive(Debug, Clone, Copy)]
enum Family {
    Boolean,
    Integer,
    Float,
    Decimal,
    Enum,
    Set,
    DateTime,
    Timestamp,
    Date,
    Time,
    Year,
    String,
    Text,
    Binary,
    Json,
}

// Order matters: boolean before integer (`tinyint(1)`), datetime before date,
// timestamp before time.
const TYPE_PATTERNS: &[(&str, Family)] = &[
    (r"^(bool|boolean|tinyint\(1\)|bit\(1\))(\s|$)", Family::Boolean),
    (r"^(tinyint|smallint|mediumint|bigint|integer|int)\b", Family::Integer),
    (r"^(float|double|real)\b", Family::Float),
    (r"^(decimal|numeric|dec|fixed)\b", Family::Decimal),
    (r"^enum\(", Family::Enum),
    (r"^set\(", Family::Set),
    (r"^datetime\b", Family::DateTime),
    (r"^timestamp\b", Family::Timestamp),
    (r"^date\b", Family::Date),
    (r"^time\b", Family::Time),
    (r"^year\b", Family::Year),
    (r"^(char|varchar|nchar|nvarchar)\b", Family::String),
    (r"^(tinytext|text|mediumtext|longtext)\b", Family::Text),
    (r"^(binary|varbinary|tinyblob|blob|mediumblob|longblob|bit)\b", Family::Binary),
    (r"^json\b", Family::Json),
];

fn type_patterns() -> &'static [(Regex, Family)] {
    static PATTERNS: OnceLock<Vec<(Regex, Family)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        TYPE_PATTERNS
            .iter()
            .map(|(p, family)| (Regex::new(p).expect("invalid built-in type regex"), *family))
            .collect()
    })
}

impl SemanticType {
    /// Classify a raw column type such as `int(10) unsigned` or `enum('a','b')`.
    ///
    /// Returns `None` when no pattern matches.
    pub fn classify(raw_type: &str) -> Option<Self> {
        let raw = raw_type.trim().to_ascii_lowercase();
        let (_, family) = type_patterns().iter().find(|(re, _)| re.is_match(&raw))?;
        Some(match family {
            Family::Boolean => Self::Boolean,
            Family::Integer => Self::Integer,
            Family::Float => Self::Float,
            Family::Decimal => Self::Decimal,
            // Enum members keep their original case.
            Family::Enum => Self::Enum(parse_enum_values(raw_type.trim())),
            Family::Set => Self::Set(parse_enum_values(raw_type.trim())),
            Family::DateTime => Self::DateTime,
            Family::Timestamp => Self::Timestamp,
            Family::Date => Self::Date,
            Family::Time => Self::Time,
            Family::Year => Self::Year,
            Family::String => Self::String,
            Family::Text => Self::Text,
            Family::Binary => Self::Binary,
            Family::Json => Self::Json,
        })
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::DateTime | Self::Timestamp | Self::Year
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }
}

/// Parse `enum('a','b''c')` into `["a", "b'c"]`.
fn parse_enum_values(raw: &str) -> Vec<String> {
    let Some(open) = raw.find('(') else {
        return Vec::new();
    };
    let body = raw[open + 1..].trim_end().trim_end_matches(')');

    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                current.push('\'');
                chars.next();
            }
            '\'' if in_quote => {
                values.push(std::mem::take(&mut current));
                in_quote = false;
            }
            '\'' => in_quote = true,
            _ if in_quote => current.push(c),
            _ => {}
        }
    }
    values
}

/// Raw metadata for one column, as read from the catalog views.
#[derive(Debug, Clone, Default)]
pub struct RawColumn {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub length: Option<u64>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub extra: String,
    pub ordinal: u32,
}

/// Derived view of one column's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAttribute {
    pub name: String,
    pub raw_type: String,
    pub semantic: SemanticType,
    pub nullable: bool,
    pub default: Option<String>,
    pub length: Option<u64>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub unsigned: bool,
    pub auto_increment: bool,
    pub ordinal: u32,
    /// The default is an expression evaluated by the engine on insert.
    #[serde(default)]
    pub default_generated: bool,
}

impl ColumnAttribute {
    /// Build an attribute, classifying the raw type.
    ///
    /// Fails with [`OrmError::UnknownColumnType`] when the type matches no pattern.
    pub fn from_raw(table: &str, raw: RawColumn) -> OrmResult<Self> {
        let semantic =
            SemanticType::classify(&raw.column_type).ok_or_else(|| OrmError::UnknownColumnType {
                table: table.to_string(),
                column: raw.name.clone(),
                raw_type: raw.column_type.clone(),
            })?;
        let lowered = raw.column_type.to_ascii_lowercase();
        let extra = raw.extra.to_ascii_lowercase();

        Ok(Self {
            unsigned: lowered.contains("unsigned"),
            auto_increment: extra.contains("auto_increment"),
            default_generated: extra.contains("default_generated")
                || (semantic.is_temporal()
                    && raw.default.as_deref().is_some_and(is_default_expression)),
            name: raw.name,
            raw_type: raw.column_type,
            semantic,
            nullable: raw.nullable,
            default: raw.default,
            length: raw.length,
            precision: raw.precision,
            scale: raw.scale,
            ordinal: raw.ordinal,
        })
    }

    /// Member list for enum/set columns.
    pub fn enum_values(&self) -> Option<&[String]> {
        match &self.semantic {
            SemanticType::Enum(values) | SemanticType::Set(values) => Some(values),
            _ => None,
        }
    }

    /// A column that must receive a value: not nullable, no default, not engine-assigned.
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default.is_none() && !self.auto_increment
    }

    /// The column default converted to a typed value.
    ///
    /// NULL when there is no default or the engine computes it
    /// (`CURRENT_TIMESTAMP` and other expressions).
    pub fn default_value(&self) -> Value {
        let Some(raw) = self.default.as_deref() else {
            return Value::Null;
        };
        if self.default_generated {
            return Value::Null;
        }
        let quoted = raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'');
        if !quoted && raw.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        let text = if quoted {
            raw[1..raw.len() - 1].replace("''", "'")
        } else {
            raw.to_string()
        };

        match &self.semantic {
            SemanticType::Boolean => parse_bool(&text).map_or(Value::Text(text), Value::Bool),
            SemanticType::Integer | SemanticType::Year => {
                if let Ok(v) = text.parse::<i64>() {
                    Value::Int(v)
                } else if let Ok(v) = text.parse::<u64>() {
                    Value::UInt(v)
                } else {
                    Value::Text(text)
                }
            }
            SemanticType::Float => text.parse::<f64>().map_or(Value::Text(text), Value::Float),
            SemanticType::Decimal => Value::Decimal(text),
            SemanticType::Date => parse_date(&text).map_or(Value::Text(text), Value::Date),
            SemanticType::Time => parse_time(&text).map_or(Value::Text(text), Value::Time),
            SemanticType::DateTime | SemanticType::Timestamp => {
                parse_datetime(&text).map_or(Value::Text(text), Value::DateTime)
            }
            _ => Value::Text(text),
        }
    }

    /// Type-specific value check.
    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() {
            if self.is_required() {
                return Err(self.error(ValidationCode::Required, "is required"));
            }
            return Ok(());
        }

        match &self.semantic {
            SemanticType::Boolean => self.check_boolean(value),
            SemanticType::Integer => self.check_integer(value),
            SemanticType::Float => match value.as_f64() {
                Some(_) => Ok(()),
                None => Err(self.error(ValidationCode::Numeric, "must be a number")),
            },
            SemanticType::Decimal => self.check_decimal(value),
            SemanticType::String | SemanticType::Text => self.check_length(value),
            SemanticType::Enum(values) => {
                let text = value.to_string();
                self.check_members(values, std::iter::once(text.as_str()))
            }
            SemanticType::Set(values) => {
                let text = value.to_string();
                self.check_members(values, text.split(',').filter(|m| !m.is_empty()))
            }
            SemanticType::Date => self.check_temporal(value, |v| match v {
                Value::Date(_) | Value::DateTime(_) => true,
                other => parse_date(&other.to_string()).is_some(),
            }),
            SemanticType::Time => self.check_temporal(value, |v| match v {
                Value::Time(_) => true,
                other => parse_time(&other.to_string()).is_some(),
            }),
            SemanticType::DateTime | SemanticType::Timestamp => {
                self.check_temporal(value, |v| match v {
                    Value::DateTime(_) | Value::Date(_) => true,
                    other => parse_datetime(&other.to_string()).is_some(),
                })
            }
            SemanticType::Year => match value.as_i64() {
                Some(y) if y == 0 || (1901..=2155).contains(&y) => Ok(()),
                Some(_) => Err(self
                    .error(ValidationCode::Range, "is not a valid year")
                    .with_detail("min", 1901)
                    .with_detail("max", 2155)),
                None => Err(self.error(ValidationCode::Temporal, "is not a valid year")),
            },
            SemanticType::Binary => self.check_length(value),
            SemanticType::Json => match value {
                Value::Text(s) if serde_json::from_str::<serde_json::Value>(s).is_ok() => Ok(()),
                _ => Err(self.error(ValidationCode::Json, "is not valid JSON")),
            },
        }
    }

    fn error(&self, code: ValidationCode, what: &str) -> ValidationError {
        ValidationError::new(&self.name, code, format!("{} {}", self.name, what))
    }

    fn check_members<'v>(
        &self,
        allowed: &[String],
        mut members: impl Iterator<Item = &'v str>,
    ) -> Result<(), ValidationError> {
        if members.all(|m| allowed.iter().any(|a| a == m)) {
            Ok(())
        } else {
            Err(self
                .error(ValidationCode::OneOf, "is not an allowed value")
                .with_detail("allowed", allowed.to_vec()))
        }
    }

    fn check_boolean(&self, value: &Value) -> Result<(), ValidationError> {
        let ok = match value {
            Value::Bool(_) => true,
            Value::Int(v) => *v == 0 || *v == 1,
            Value::UInt(v) => *v <= 1,
            Value::Text(s) => parse_bool(s).is_some(),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(self.error(ValidationCode::Boolean, "must be a boolean"))
        }
    }

    fn check_integer(&self, value: &Value) -> Result<(), ValidationError> {
        let parsed: Option<i128> = match value {
            Value::Int(v) => Some(i128::from(*v)),
            Value::UInt(v) => Some(i128::from(*v)),
            Value::Bool(b) => Some(i128::from(*b)),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i128),
            Value::Text(s) | Value::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        };
        let Some(v) = parsed else {
            return Err(self.error(ValidationCode::Numeric, "must be an integer"));
        };

        let (min, max) = integer_bounds(&self.raw_type, self.unsigned);
        if v < min || v > max {
            return Err(self
                .error(ValidationCode::Range, "is out of range")
                .with_detail("min", min.to_string())
                .with_detail("max", max.to_string()));
        }
        Ok(())
    }

    fn check_decimal(&self, value: &Value) -> Result<(), ValidationError> {
        static DECIMAL_RE: OnceLock<Regex> = OnceLock::new();
        let re = DECIMAL_RE.get_or_init(|| {
            Regex::new(r"^[+-]?(\d*)(?:\.(\d*))?$").expect("invalid built-in decimal regex")
        });

        let text = value.to_string();
        let text = text.trim();
        let Some(caps) = re.captures(text).filter(|_| text.chars().any(|c| c.is_ascii_digit()))
        else {
            return Err(self.error(ValidationCode::Numeric, "must be a number"));
        };

        if let Some(precision) = self.precision {
            let scale = self.scale.unwrap_or(0);
            let integer_digits = caps
                .get(1)
                .map_or(0, |m| m.as_str().trim_start_matches('0').len());
            let allowed = precision.saturating_sub(scale) as usize;
            if integer_digits > allowed {
                return Err(self
                    .error(ValidationCode::Range, "has too many digits")
                    .with_detail("precision", precision)
                    .with_detail("scale", scale));
            }
        }
        Ok(())
    }

    fn check_length(&self, value: &Value) -> Result<(), ValidationError> {
        let Some(max) = self.length else {
            return Ok(());
        };
        let len = match value {
            Value::Bytes(b) => b.len() as u64,
            other => other.to_string().chars().count() as u64,
        };
        if len > max {
            return Err(self
                .error(ValidationCode::Len, "is too long")
                .with_detail("max", max)
                .with_detail("actual", len));
        }
        Ok(())
    }

    fn check_temporal(
        &self,
        value: &Value,
        parses: impl Fn(&Value) -> bool,
    ) -> Result<(), ValidationError> {
        if parses(value) {
            Ok(())
        } else {
            Err(self.error(ValidationCode::Temporal, "is not a valid date/time"))
        }
    }
}

/// Unquoted defaults the engine evaluates rather than stores verbatim.
fn is_default_expression(raw: &str) -> bool {
    static EXPRESSION_RE: OnceLock<Regex> = OnceLock::new();
    let re = EXPRESSION_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(\(|(current_timestamp|current_date|current_time|localtime|localtimestamp|now|curdate|curtime|utc_timestamp|utc_date|utc_time)\b)",
        )
        .expect("invalid built-in default expression regex")
    });
    re.is_match(raw.trim())
}

fn integer_bounds(raw_type: &str, unsigned: bool) -> (i128, i128) {
    let lowered = raw_type.trim().to_ascii_lowercase();
    let bits = if lowered.starts_with("tinyint") {
        8
    } else if lowered.starts_with("smallint") {
        16
    } else if lowered.starts_with("mediumint") {
        24
    } else if lowered.starts_with("bigint") {
        64
    } else {
        32
    };
    if unsigned {
        (0, (1i128 << bits) - 1)
    } else {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}
