//! INSERT query.

use super::{Execution, Statement, StatementKind, execution_accessors};
use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::grammar::{Clause, ColumnList, quote_ident};
use crate::schema::SchemaCatalog;
use crate::value::{Bindings, Record};

/// Single-row INSERT.
///
/// Columns unknown to the table and auto-incremented columns are dropped;
/// the remaining ones keep the table's column order.
#[derive(Debug, Clone)]
pub struct Insert {
    table: String,
    values: ColumnList,
    execution: Execution,
}

impl Insert {
    pub fn new(catalog: &SchemaCatalog, table: &str, data: &Record) -> OrmResult<Self> {
        let mut values = ColumnList::new(table);
        for column in catalog.columns(table)? {
            if column.auto_increment {
                continue;
            }
            if let Some(value) = data.get(&column.name) {
                values.push(column.name.clone(), value.clone());
            }
        }
        if values.is_empty() {
            return Err(OrmError::EmptyInsertData(table.to_string()));
        }
        Ok(Self {
            table: table.to_string(),
            values,
            execution: Execution::default(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.columns()
    }

    pub fn statement(&self) -> OrmResult<Statement> {
        let mut bindings = Bindings::new();
        self.values.collect_bindings(&mut bindings)?;
        Ok(Statement {
            sql: format!("INSERT INTO {} {}", quote_ident(&self.table), self.values),
            bindings,
            kind: StatementKind::Insert,
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

    /// Key the engine generated for the auto-incremented column on the last run.
    pub fn last_insert_id(&self) -> Option<u64> {
        self.execution.last_insert_id()
    }

    execution_accessors!();
}
