//! Statement objects built on the clause grammar.
//!
//! Every query validates its input at construction, so build errors surface
//! before any connection is touched. Rendering is pure; [`Select::statement`]
//! and friends can be called any number of times and always agree with what
//! `run()` sends.
//!
//! # Usage
//!
//! ```ignore
//! use sqlrow::{record, Delete, Insert, Select, Update};
//!
//! let mut active = Select::new("users")
//!     .where_eq("active", true)
//!     .order_by("users.email", sqlrow::Direction::Asc)
//!     .limit(20);
//! let rows = active.fetch_all(&conn).await?;
//!
//! let mut insert = Insert::new(&catalog, "users", &record! { "email" => "a@b.c" })?;
//! insert.run(&conn).await?;
//! let id = insert.last_insert_id();
//!
//! Update::new(&catalog, "users", &record! { "active" => false }, &record! { "id" => 7 })?
//!     .run(&conn)
//!     .await?;
//!
//! Delete::new(&catalog, "users", &record! { "id" => 7 })?.run(&conn).await?;
//! ```

mod delete;
mod insert;
mod select;
mod update;

#[cfg(test)]
mod tests;

use std::fmt;

pub use delete::Delete;
pub use insert::Insert;
pub use select::Select;
pub use update::Update;

use crate::connection::{Connection, ExecOutcome};
use crate::error::{ExecError, OrmError, OrmResult};
use crate::value::{Bindings, Record};

/// Longest SQL text written to the `sqlrow.sql` log target.
const MAX_LOGGED_SQL: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Count => "count",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Rendered SQL text plus the values for its `:label` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub bindings: Bindings,
    pub kind: StatementKind,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Join rendered fragments with single spaces, skipping empty ones.
pub(crate) fn assemble<I: IntoIterator<Item = String>>(fragments: I) -> String {
    fragments
        .into_iter()
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_sql(sql: &str) -> String {
    if sql.len() <= MAX_LOGGED_SQL {
        return sql.to_string();
    }
    let mut end = MAX_LOGGED_SQL;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

/// Prepared statement and outcome of the last `run()`.
///
/// Builder mutations call [`Execution::invalidate`] so the next run prepares
/// again from the current clauses.
#[derive(Debug, Clone, Default)]
pub(crate) struct Execution {
    prepared: Option<Statement>,
    ran: bool,
    row_count: u64,
    last_insert_id: Option<u64>,
    error: Option<ExecError>,
}

impl Execution {
    pub(crate) fn invalidate(&mut self) {
        self.prepared = None;
    }

    /// The statement prepared by the last run, unless invalidated since.
    pub(crate) fn prepared(&self) -> Option<Statement> {
        self.prepared.clone()
    }

    pub(crate) fn store(&mut self, statement: &Statement) {
        self.prepared = Some(statement.clone());
    }

    fn start(&mut self, statement: &Statement) {
        self.ran = true;
        self.row_count = 0;
        self.last_insert_id = None;
        self.error = None;
        tracing::debug!(
            target: "sqlrow.sql",
            kind = statement.kind.as_str(),
            label_count = statement.bindings.len(),
            sql = %truncate_sql(&statement.sql),
            "execute"
        );
    }

    fn fail(&mut self, err: crate::error::EngineError) -> OrmError {
        let err = ExecError::transcribe(err);
        self.error = Some(err.clone());
        OrmError::Execution(err)
    }

    pub(crate) async fn query(
        &mut self,
        conn: &impl Connection,
        statement: &Statement,
    ) -> OrmResult<Vec<Record>> {
        self.start(statement);
        match conn.query(&statement.sql, &statement.bindings).await {
            Ok(rows) => {
                self.row_count = rows.len() as u64;
                Ok(rows)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    pub(crate) async fn execute(
        &mut self,
        conn: &impl Connection,
        statement: &Statement,
    ) -> OrmResult<ExecOutcome> {
        self.start(statement);
        match conn.execute(&statement.sql, &statement.bindings).await {
            Ok(outcome) => {
                self.row_count = outcome.rows_affected;
                self.last_insert_id = outcome.last_insert_id;
                Ok(outcome)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Ran at least once and the engine reported no error.
    pub(crate) fn is_success(&self) -> bool {
        self.ran && self.error.is_none()
    }

    pub(crate) fn row_count(&self) -> u64 {
        self.row_count
    }

    pub(crate) fn last_insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }

    pub(crate) fn last_error(&self) -> Option<&ExecError> {
        self.error.as_ref()
    }
}

/// Accessors shared by every query type.
macro_rules! execution_accessors {
    () => {
        /// Whether the last `run()` completed with no engine error.
        pub fn is_success(&self) -> bool {
            self.execution.is_success()
        }

        /// Rows returned (SELECT) or affected (INSERT/UPDATE/DELETE) by the last run.
        pub fn row_count(&self) -> u64 {
            self.execution.row_count()
        }

        pub fn last_error(&self) -> Option<&$crate::error::ExecError> {
            self.execution.last_error()
        }
    };
}

pub(crate) use execution_accessors;
