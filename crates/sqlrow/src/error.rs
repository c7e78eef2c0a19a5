//! Error types for sqlrow
//!
//! Errors fall into four families:
//! - build errors: raised while composing a statement, before any I/O
//! - schema errors: unknown tables/columns or unusable metadata
//! - execution errors: engine failures, transcribed into [`ExecError`]
//! - row/relation errors: identity and classification problems

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Result type alias for sqlrow operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Insert was asked to write a row with no usable columns
    #[error("Insert for table '{0}' has no data after column filtering")]
    EmptyInsertData(String),

    /// Update without a WHERE clause
    #[error("Update on table '{0}' requires at least one condition")]
    UpdateRequiresConditions(String),

    /// Update without a SET clause
    #[error("Update on table '{0}' requires at least one alteration")]
    UpdateRequiresAlterations(String),

    /// Delete without a WHERE clause
    #[error("Delete on table '{0}' requires at least one condition; refusing to truncate")]
    DeleteUsedAsTruncate(String),

    /// An alias is already bound to another table in the same statement
    #[error("Alias '{alias}' already refers to table '{existing}', cannot reuse it for '{requested}'")]
    AliasConflict {
        alias: String,
        existing: String,
        requested: String,
    },

    /// Malformed join description
    #[error("Invalid join: {0}")]
    InvalidJoinSpec(String),

    /// Two clauses tried to bind the same label with different values
    #[error("Binding label ':{0}' is bound twice with different values")]
    DuplicateBinding(String),

    /// Table not present in the schema catalog
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column not present on a known table
    #[error("Column not found: {table}.{column}")]
    ColumnNotFound { table: String, column: String },

    /// The table declares no primary key
    #[error("Table '{0}' has no primary key")]
    NoPrimaryKeysDefined(String),

    /// The engine reported a column type that cannot be classified
    #[error("Unknown column type '{raw_type}' for {table}.{column}")]
    UnknownColumnType {
        table: String,
        column: String,
        raw_type: String,
    },

    /// Metadata query returned nothing usable
    #[error("Schema load failure: {0}")]
    SchemaLoadFailure(String),

    /// Statement execution failed
    #[error("Execution error: {0}")]
    Execution(#[from] ExecError),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// No primary/unique key subset could be derived from the row data
    #[error("Row of table '{0}' has no usable identity (primary or unique key)")]
    MissingIdentity(String),

    /// Identity lookup matched more than one row
    #[error("Identity lookup on table '{table}' matched {matched} rows")]
    AmbiguousLoad { table: String, matched: usize },

    /// Pivot table does not fit any relation shape
    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    /// A row hook vetoed the operation
    #[error("Hook aborted: {0}")]
    HookAborted(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error (schema cache)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Errors raised while composing a statement. No I/O has happened.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInsertData(_)
                | Self::UpdateRequiresConditions(_)
                | Self::UpdateRequiresAlterations(_)
                | Self::DeleteUsedAsTruncate(_)
                | Self::AliasConflict { .. }
                | Self::InvalidJoinSpec(_)
                | Self::DuplicateBinding(_)
        )
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound(_)
                | Self::ColumnNotFound { .. }
                | Self::NoPrimaryKeysDefined(_)
                | Self::UnknownColumnType { .. }
                | Self::SchemaLoadFailure(_)
        )
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Kind of the underlying execution error, if any.
    pub fn exec_kind(&self) -> Option<ExecErrorKind> {
        match self {
            Self::Execution(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Check if this is a duplicate key error
    pub fn is_duplicate_key(&self) -> bool {
        self.exec_kind() == Some(ExecErrorKind::DuplicateKey)
    }
}

impl From<EngineError> for OrmError {
    fn from(err: EngineError) -> Self {
        Self::Execution(ExecError::transcribe(err))
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Raw failure reported by a [`Connection`](crate::Connection).
///
/// `code` is the vendor error number (e.g. `1062`), `sql_state` the
/// five-character SQLSTATE.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{sql_state}] ({code}) {message}")]
pub struct EngineError {
    pub sql_state: String,
    pub code: u32,
    pub message: String,
}

impl EngineError {
    pub fn new(sql_state: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Self {
            sql_state: sql_state.into(),
            code,
            message: message.into(),
        }
    }
}

/// Classified engine failure.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecErrorKind {
    DuplicateKey,
    RequiredField,
    ReferentialIntegrity,
    UnknownTable,
    UnknownColumn,
    Syntax,
    DataTooLong,
    OutOfRange,
    InvalidValue,
    Deadlock,
    LockWaitTimeout,
    AccessDenied,
    ConnectionLost,
    Other,
}

impl ExecErrorKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1062 => Self::DuplicateKey,
            1048 | 1364 => Self::RequiredField,
            1216 | 1217 | 1451 | 1452 => Self::ReferentialIntegrity,
            1146 => Self::UnknownTable,
            1054 => Self::UnknownColumn,
            1064 => Self::Syntax,
            1406 => Self::DataTooLong,
            1264 => Self::OutOfRange,
            1292 | 1366 => Self::InvalidValue,
            1213 => Self::Deadlock,
            1205 => Self::LockWaitTimeout,
            1044 | 1045 | 1142 => Self::AccessDenied,
            2006 | 2013 => Self::ConnectionLost,
            _ => Self::Other,
        }
    }

    /// Whether retrying the whole statement may succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Deadlock | Self::LockWaitTimeout | Self::ConnectionLost
        )
    }
}

/// An engine failure transcribed into the crate's taxonomy.
///
/// `code`, `sql_state` and `message` are always preserved verbatim.
/// `constraint` carries the offending key, constraint, column or table name
/// when the message exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} [{sql_state}] ({code}): {message}")]
pub struct ExecError {
    pub kind: ExecErrorKind,
    pub sql_state: String,
    pub code: u32,
    pub message: String,
    pub constraint: Option<String>,
}

impl ExecError {
    pub fn transcribe(err: EngineError) -> Self {
        let kind = ExecErrorKind::from_code(err.code);
        let constraint = extract_name(kind, err.code, &err.message);
        Self {
            kind,
            sql_state: err.sql_state,
            code: err.code,
            message: err.message,
            constraint,
        }
    }
}

fn name_patterns() -> &'static [(u32, Regex)] {
    static PATTERNS: OnceLock<Vec<(u32, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (1062, r"for key '([^']+)'"),
            (1048, r"Column '([^']+)' cannot be null"),
            (1364, r"Field '([^']+)' doesn't have a default value"),
            (1216, r"CONSTRAINT `([^`]+)`"),
            (1217, r"CONSTRAINT `([^`]+)`"),
            (1451, r"CONSTRAINT `([^`]+)`"),
            (1452, r"CONSTRAINT `([^`]+)`"),
            (1146, r"Table '([^']+)' doesn't exist"),
            (1054, r"Unknown column '([^']+)'"),
            (1406, r"for column '([^']+)'"),
            (1264, r"for column '([^']+)'"),
            (1366, r"for column '([^']+)'"),
            (1292, r"for column '([^']+)'"),
        ]
        .into_iter()
        .map(|(code, pattern)| (code, Regex::new(pattern).expect("invalid built-in regex")))
        .collect()
    })
}

fn extract_name(kind: ExecErrorKind, code: u32, message: &str) -> Option<String> {
    let (_, re) = name_patterns().iter().find(|(c, _)| *c == code)?;
    let captured = re.captures(message)?.get(1)?.as_str();
    let name = match kind {
        // `users.email_unique` / `shop.users`: keep the last segment.
        ExecErrorKind::DuplicateKey | ExecErrorKind::UnknownTable => {
            captured.rsplit('.').next().unwrap_or(captured)
        }
        _ => captured,
    };
    Some(name.to_string())
}
