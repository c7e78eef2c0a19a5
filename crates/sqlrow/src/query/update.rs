//! UPDATE query.

use super::{Execution, Statement, StatementKind, assemble, execution_accessors};
use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::grammar::{Clause, Condition, Filter, Set, quote_ident};
use crate::schema::SchemaCatalog;
use crate::value::{Bindings, Record};

/// UPDATE with mandatory SET and WHERE clauses.
#[derive(Debug, Clone)]
pub struct Update {
    table: String,
    set: Set,
    filter: Filter,
    execution: Execution,
}

impl Update {
    /// Build `UPDATE table SET alterations WHERE conditions`.
    ///
    /// Conditions are checked first: an empty condition set fails with
    /// `UpdateRequiresConditions` whatever the alterations. Alterations on
    /// unknown columns are dropped; if none remain the update fails with
    /// `UpdateRequiresAlterations`. Conditions on unknown columns fail with
    /// `ColumnNotFound`.
    pub fn new(
        catalog: &SchemaCatalog,
        table: &str,
        alterations: &Record,
        conditions: &Record,
    ) -> OrmResult<Self> {
        if conditions.is_empty() {
            return Err(OrmError::UpdateRequiresConditions(table.to_string()));
        }
        let schema = catalog.table(table)?;

        let mut set = Set::new(table);
        for (column, value) in alterations {
            if schema.has_column(column) {
                set.assign(column.clone(), value.clone());
            }
        }
        if set.is_empty() {
            return Err(OrmError::UpdateRequiresAlterations(table.to_string()));
        }

        if let Some(unknown) = conditions.keys().find(|c| !schema.has_column(c)) {
            return Err(OrmError::column_not_found(table, unknown.as_str()));
        }
        let mut filter = Filter::where_clause();
        filter.push(Condition::matching(table, conditions));

        Ok(Self {
            table: table.to_string(),
            set,
            filter,
            execution: Execution::default(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn statement(&self) -> OrmResult<Statement> {
        let mut bindings = Bindings::new();
        self.set.collect_bindings(&mut bindings)?;
        self.filter.collect_bindings(&mut bindings)?;
        Ok(Statement {
            sql: assemble([
                format!("UPDATE {}", quote_ident(&self.table)),
                self.set.to_string(),
                self.filter.to_string(),
            ]),
            bindings,
            kind: StatementKind::Update,
        })
    }

    /// Execute; returns the number of affected rows.
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
