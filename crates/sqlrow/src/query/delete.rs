//! DELETE query.

use super::{Execution, Statement, StatementKind, execution_accessors};
use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::grammar::{Clause, Condition, Filter, quote_ident};
use crate::schema::SchemaCatalog;
use crate::value::{Bindings, Record};

/// DELETE with a mandatory WHERE clause.
#[derive(Debug, Clone)]
pub struct Delete {
    table: String,
    filter: Filter,
    execution: Execution,
}

impl Delete {
    /// Build `DELETE FROM table WHERE conditions`.
    ///
    /// An empty condition set fails with `DeleteUsedAsTruncate`; conditions
    /// on unknown columns fail with `ColumnNotFound`.
    pub fn new(catalog: &SchemaCatalog, table: &str, conditions: &Record) -> OrmResult<Self> {
        if conditions.is_empty() {
            return Err(OrmError::DeleteUsedAsTruncate(table.to_string()));
        }
        let schema = catalog.table(table)?;
        if let Some(unknown) = conditions.keys().find(|c| !schema.has_column(c)) {
            return Err(OrmError::column_not_found(table, unknown.as_str()));
        }
        let mut filter = Filter::where_clause();
        filter.push(Condition::matching(table, conditions));
        Ok(Self {
            table: table.to_string(),
            filter,
            execution: Execution::default(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn statement(&self) -> OrmResult<Statement> {
        let mut bindings = Bindings::new();
        self.filter.collect_bindings(&mut bindings)?;
        Ok(Statement {
            sql: format!("DELETE FROM {} {}", quote_ident(&self.table), self.filter),
            bindings,
            kind: StatementKind::Delete,
        })
    }

    /// Execute; returns the number of deleted rows.
    pub async fn run(&mut self, conn: &impl Connection) -> OrmResult<u64> {
        let statement = match self.execution.prepared() {
            Some(statement) => statement,
            None => {
                let statement = self.statement()?;
                self.execution.store(&statement);
                statement
            }
        };
        Ok(self.execution.execute(conn, &statement).await?.rows_affected)
    }

    execution_accessors!();
}
