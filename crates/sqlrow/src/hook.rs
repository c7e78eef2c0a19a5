//! Row lifecycle hooks.
//!
//! Hooks are registered explicitly on a [`Row`] and run in registration
//! order. A before-hook returning [`HookAction::Abort`] stops the operation
//! before any statement is issued.
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlrow::{HookAction, Row, RowHook};
//!
//! struct ReadOnly;
//!
//! impl RowHook for ReadOnly {
//!     fn before_wipe(&self, row: &Row) -> HookAction {
//!         HookAction::Abort(format!("{} rows are never deleted", row.table()))
//!     }
//! }
//!
//! let row = Row::new(catalog, "ledger", record)?.with_hook(Arc::new(ReadOnly));
//! ```

use crate::row::Row;
use crate::value::Value;

/// The result of a before-hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    /// Stop the operation with this message.
    Abort(String),
}

/// Lifecycle callbacks around `persist()` and `wipe()`.
pub trait RowHook: Send + Sync {
    /// Called before validation. May alter the row.
    fn before_persist(&self, row: &mut Row) -> HookAction {
        let _ = row;
        HookAction::Continue
    }

    /// Called after the row was written.
    fn after_persist(&self, _row: &Row) {}

    fn before_wipe(&self, row: &Row) -> HookAction {
        let _ = row;
        HookAction::Continue
    }

    /// Called after the row was deleted.
    fn after_wipe(&self, _row: &Row) {}
}

/// Stamps creation and modification time columns, when the table has them.
#[derive(Debug, Clone)]
pub struct TouchTimestamps {
    pub created_at: String,
    pub updated_at: String,
}

impl Default for TouchTimestamps {
    fn default() -> Self {
        Self {
            created_at: "created_at".to_string(),
            updated_at: "updated_at".to_string(),
        }
    }
}

impl RowHook for TouchTimestamps {
    fn before_persist(&self, row: &mut Row) -> HookAction {
        let now = Value::DateTime(chrono::Utc::now().naive_utc());
        let mut stamps = crate::value::Record::new();
        if row.is_new() && row.get(&self.created_at).is_none_or(Value::is_null) {
            stamps.insert(self.created_at.clone(), now.clone());
        }
        stamps.insert(self.updated_at.clone(), now);
        // Columns the table does not have are skipped by `alter`.
        match row.alter(stamps) {
            Ok(_) => HookAction::Continue,
            Err(err) => HookAction::Abort(err.to_string()),
        }
    }
}
