//! Column validation report returned by [`Row::persist`](crate::Row::persist).
//!
//! A failed check is data, not an error: every failing column of the row is
//! reported together, keyed by column name, and storage is left untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Which column check failed.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
    /// NOT NULL column without default received no value.
    Required,
    /// Character or byte length over the column width.
    Len,
    /// Integer width, decimal digits or year out of bounds.
    Range,
    Numeric,
    Boolean,
    Temporal,
    /// Not a member of the enum/set definition.
    OneOf,
    Json,
}

impl ValidationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Len => "len",
            Self::Range => "range",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::OneOf => "one_of",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed check on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub column: String,
    pub code: ValidationCode,
    pub message: String,
    /// Bounds or allowed members that explain the failure.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<&'static str, serde_json::Value>,
}

impl ValidationError {
    pub fn new(column: impl Into<String>, code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            code,
            message: message.into(),
            detail: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &'static str, value: impl Into<serde_json::Value>) -> Self {
        self.detail.insert(key, value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Failed checks of one row, grouped by column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    columns: BTreeMap<String, Vec<ValidationError>>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Total number of failed checks.
    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn push(&mut self, err: ValidationError) {
        self.columns.entry(err.column.clone()).or_default().push(err);
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Failures recorded for `column`; empty when it passed.
    pub fn get(&self, column: &str) -> &[ValidationError] {
        self.columns.get(column).map_or(&[], Vec::as_slice)
    }

    /// Failing column names, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.columns.values().flatten()
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        for err in iter {
            self.push(err);
        }
    }
}
