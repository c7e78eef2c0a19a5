//! Connection trait consumed by queries, rows and relations.
//!
//! sqlrow never owns a driver. Callers implement [`Connection`] on top of
//! whatever MySQL-family client they use; statements arrive with named
//! `:label` placeholders and a matching [`Bindings`] map.

use crate::error::EngineError;
use crate::value::{Bindings, Record};

/// Outcome of a non-query statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Key generated by the engine for an auto-incremented column, if any.
    pub last_insert_id: Option<u64>,
}

impl ExecOutcome {
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }

    pub fn inserted(last_insert_id: u64) -> Self {
        Self {
            rows_affected: 1,
            last_insert_id: Some(last_insert_id),
        }
    }
}

/// A trait over database handles.
///
/// Failures are reported as the raw engine triple; sqlrow transcribes them
/// into [`ExecError`](crate::ExecError).
pub trait Connection: Send + Sync {
    /// Execute a statement and return all rows.
    fn query(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl std::future::Future<Output = Result<Vec<Record>, EngineError>> + Send;

    /// Execute a statement that returns no rows.
    fn execute(
        &self,
        sql: &str,
        bindings: &Bindings,
    ) -> impl std::future::Future<Output = Result<ExecOutcome, EngineError>> + Send;

    /// Begin a transaction.
    ///
    /// The default implementation issues `START TRANSACTION`.
    fn begin(&self) -> impl std::future::Future<Output = Result<(), EngineError>> + Send {
        async move {
            let none = Bindings::new();
            self.execute("START TRANSACTION", &none).await.map(|_| ())
        }
    }

    fn commit(&self) -> impl std::future::Future<Output = Result<(), EngineError>> + Send {
        async move {
            let none = Bindings::new();
            self.execute("COMMIT", &none).await.map(|_| ())
        }
    }

    fn rollback(&self) -> impl std::future::Future<Output = Result<(), EngineError>> + Send {
        async move {
            let none = Bindings::new();
            self.execute("ROLLBACK", &none).await.map(|_| ())
        }
    }
}
