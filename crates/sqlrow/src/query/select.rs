//! SELECT query.

use std::collections::BTreeSet;

use super::{Execution, Statement, StatementKind, assemble, execution_accessors};
use crate::connection::Connection;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::grammar::{
    Clause, Condition, Direction, Filter, GroupBy, Join, Limit, Operand, OrderBy, Predicate,
    Projection, SelectFrom,
};
use crate::value::{Bindings, Record, Value};

/// SELECT builder.
///
/// Bare column names in projections and WHERE predicates are qualified with
/// the base table (or its alias). GROUP BY, HAVING and ORDER BY terms are
/// rendered as given so they can refer to projection aliases.
#[derive(Debug, Clone)]
pub struct Select {
    from: SelectFrom,
    joins: Vec<Join>,
    filter: Filter,
    group_by: GroupBy,
    having: Filter,
    order_by: OrderBy,
    limit: Limit,
    execution: Execution,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            from: SelectFrom::new(table),
            joins: Vec::new(),
            filter: Filter::where_clause(),
            group_by: GroupBy::default(),
            having: Filter::having(),
            order_by: OrderBy::default(),
            limit: Limit::default(),
            execution: Execution::default(),
        }
    }

    /// Select from `table AS alias`.
    pub fn aliased(table: impl Into<String>, alias: impl Into<String>) -> Self {
        let mut select = Self::new(table);
        select.from.alias = Some(alias.into());
        select
    }

    pub fn base_table(&self) -> &str {
        &self.from.table
    }

    /// The alias of the base table, or its name when not aliased.
    pub fn base_alias(&self) -> &str {
        self.from.reference()
    }

    // ==================== Projections ====================

    /// Replace the column list.
    pub fn select<P: Into<Projection>>(mut self, columns: impl IntoIterator<Item = P>) -> Self {
        self.from.projections.clear();
        self.execution.invalidate();
        for column in columns {
            self.push_projection(column.into());
        }
        self
    }

    /// Add columns to the current list without dropping existing ones.
    ///
    /// When nothing was selected yet, the implicit `base.*` is kept as the
    /// first entry.
    pub fn select_also<P: Into<Projection>>(
        mut self,
        columns: impl IntoIterator<Item = P>,
    ) -> Self {
        for column in columns {
            self.push_also(column.into());
        }
        self
    }

    /// Add a computed column: `<sql> AS <alias>`.
    pub fn select_expr(self, alias: impl Into<String>, sql: impl Into<String>) -> Self {
        self.select_also([Projection::expr(alias, sql)])
    }

    pub fn projections(&self) -> &[Projection] {
        &self.from.projections
    }

    fn push_projection(&mut self, projection: Projection) {
        let projection = projection.or_table(self.from.reference());
        if !self.from.projections.contains(&projection) {
            self.from.projections.push(projection);
        }
        self.execution.invalidate();
    }

    pub(crate) fn push_also(&mut self, projection: Projection) {
        if self.from.projections.is_empty() {
            let base = Projection::all_of(self.from.reference());
            self.from.projections.push(base);
        }
        self.push_projection(projection);
    }

    // ==================== Joins ====================

    /// Add an explicit join.
    ///
    /// Fails with `InvalidJoinSpec` when the join has no ON condition or its
    /// reference is already in use for the same table, and with
    /// `AliasConflict` when the alias names a different table.
    pub fn join(mut self, join: Join) -> OrmResult<Self> {
        self.push_join(join)?;
        Ok(self)
    }

    pub(crate) fn push_join(&mut self, mut join: Join) -> OrmResult<()> {
        if !join.has_conditions() {
            return Err(OrmError::InvalidJoinSpec(format!(
                "join of '{}' has no ON condition",
                join.table
            )));
        }
        if let Some(existing) = self.table_for(join.reference()) {
            if existing != join.table {
                return Err(OrmError::AliasConflict {
                    alias: join.reference().to_string(),
                    existing: existing.to_string(),
                    requested: join.table.clone(),
                });
            }
            return Err(OrmError::InvalidJoinSpec(format!(
                "'{}' is already joined",
                join.reference()
            )));
        }
        let taken: BTreeSet<String> = self
            .joins
            .iter()
            .flat_map(|j| j.labels().iter().cloned())
            .collect();
        join.relabel(&taken);
        self.joins.push(join);
        self.execution.invalidate();
        Ok(())
    }

    /// The table bound to `reference` (base or join alias).
    pub fn table_for(&self, reference: &str) -> Option<&str> {
        if self.from.reference() == reference {
            return Some(&self.from.table);
        }
        self.joins
            .iter()
            .find(|j| j.reference() == reference)
            .map(|j| j.table.as_str())
    }

    /// Whether `table` is the base table or joined under any alias.
    pub fn is_joined(&self, table: &str) -> bool {
        self.from.table == table || self.joins.iter().any(|j| j.table == table)
    }

    /// `(reference, table)` for every joined table, in join order.
    pub fn joined_tables(&self) -> impl Iterator<Item = (&str, &str)> {
        self.joins
            .iter()
            .map(|j| (j.reference(), j.table.as_str()))
    }

    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    // ==================== WHERE ====================

    /// Add an arbitrary condition to the WHERE clause.
    pub fn and_where(mut self, condition: impl Into<Condition>) -> Self {
        let reference = self.from.reference().to_string();
        self.filter.push_qualified(condition, &reference);
        self.execution.invalidate();
        self
    }

    pub fn where_eq(self, column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        self.and_where(Predicate::eq(column, value))
    }

    pub fn where_ne(self, column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        self.and_where(Predicate::ne(column, value))
    }

    pub fn where_lt(self, column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        self.and_where(Predicate::lt(column, value))
    }

    pub fn where_lte(self, column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        self.and_where(Predicate::lte(column, value))
    }

    pub fn where_gt(self, column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        self.and_where(Predicate::gt(column, value))
    }

    pub fn where_gte(self, column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        self.and_where(Predicate::gte(column, value))
    }

    pub fn where_like(self, column: impl Into<Operand>, pattern: impl Into<Value>) -> Self {
        self.and_where(Predicate::like(column, pattern))
    }

    pub fn where_in<V: Into<Value>>(
        self,
        column: impl Into<Operand>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.and_where(Predicate::in_list(column, values))
    }

    pub fn where_not_in<V: Into<Value>>(
        self,
        column: impl Into<Operand>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.and_where(Predicate::not_in(column, values))
    }

    pub fn where_null(self, column: impl Into<Operand>) -> Self {
        self.and_where(Predicate::is_null(column))
    }

    pub fn where_not_null(self, column: impl Into<Operand>) -> Self {
        self.and_where(Predicate::is_not_null(column))
    }

    pub fn where_between(
        self,
        column: impl Into<Operand>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        self.and_where(Predicate::between(column, from, to))
    }

    /// Equality on every entry of `record`.
    pub fn where_matching(self, record: &Record) -> Self {
        let reference = self.from.reference().to_string();
        self.and_where(Condition::matching(&reference, record))
    }

    /// Free-text search: `col1 LIKE :term OR col2 LIKE :term ...`.
    ///
    /// The term is bound, never interpolated. `%`, `_` and `\` in the term
    /// match literally. An empty term adds nothing.
    pub fn search<C: Into<Operand>>(self, columns: impl IntoIterator<Item = C>, term: &str) -> Self {
        let term = term.trim();
        if term.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", escape_like(term));
        let group = Condition::any(
            columns
                .into_iter()
                .map(|c| Predicate::like(c, pattern.as_str())),
        );
        self.and_where(group)
    }

    pub fn where_clause(&self) -> &Filter {
        &self.filter
    }

    // ==================== Grouping, ordering, paging ====================

    pub fn group_by(mut self, term: impl Into<Operand>) -> Self {
        self.group_by.terms.push(term.into());
        self.execution.invalidate();
        self
    }

    pub fn having(mut self, condition: impl Into<Condition>) -> Self {
        self.having.push(condition);
        self.execution.invalidate();
        self
    }

    pub fn order_by(mut self, term: impl Into<Operand>, direction: Direction) -> Self {
        self.order_by.terms.push((term.into(), direction));
        self.execution.invalidate();
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit.count = Some(count);
        self.execution.invalidate();
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.limit.offset = Some(offset);
        self.execution.invalidate();
        self
    }

    /// `page` is 1-based; both arguments are clamped to at least 1.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        self.limit(per_page).offset((page - 1) * per_page)
    }

    // ==================== Rendering ====================

    fn body(&self, from: &SelectFrom) -> Vec<String> {
        let mut parts = vec![from.to_string()];
        parts.extend(self.joins.iter().map(ToString::to_string));
        parts.push(self.filter.to_string());
        parts.push(self.group_by.to_string());
        parts.push(self.having.to_string());
        parts
    }

    fn bindings(&self) -> OrmResult<Bindings> {
        let mut bindings = Bindings::new();
        self.from.collect_bindings(&mut bindings)?;
        for join in &self.joins {
            join.collect_bindings(&mut bindings)?;
        }
        self.filter.collect_bindings(&mut bindings)?;
        self.having.collect_bindings(&mut bindings)?;
        Ok(bindings)
    }

    /// Render the statement: SELECT/FROM, JOIN, WHERE, GROUP BY, HAVING,
    /// ORDER BY, LIMIT. Absent clauses are omitted.
    pub fn statement(&self) -> OrmResult<Statement> {
        let mut parts = self.body(&self.from);
        parts.push(self.order_by.to_string());
        parts.push(self.limit.to_string());
        Ok(Statement {
            sql: assemble(parts),
            bindings: self.bindings()?,
            kind: StatementKind::Select,
        })
    }

    /// Row count of the filtered set, ignoring ORDER BY and LIMIT.
    ///
    /// Grouped queries are wrapped in a derived table so the count is of
    /// groups, not of base rows.
    pub fn count_statement(&self) -> OrmResult<Statement> {
        let grouped = !self.group_by.is_empty() || !self.having.is_empty();
        let sql = if grouped {
            let mut inner = self.from.clone();
            inner.projections = vec![Projection::expr("one", "1")];
            format!(
                "SELECT COUNT(*) AS `total` FROM ({}) AS `counted`",
                assemble(self.body(&inner))
            )
        } else {
            let mut from = self.from.clone();
            from.projections = vec![Projection::expr("total", "COUNT(*)")];
            assemble(self.body(&from))
        };
        Ok(Statement {
            sql,
            bindings: self.bindings()?,
            kind: StatementKind::Count,
        })
    }

    // ==================== Execution ====================

    fn prepare(&mut self) -> OrmResult<Statement> {
        if let Some(statement) = self.execution.prepared() {
            return Ok(statement);
        }
        let statement = self.statement()?;
        self.execution.store(&statement);
        Ok(statement)
    }

    /// Execute and return every row.
    pub async fn run(&mut self, conn: &impl Connection) -> OrmResult<Vec<Record>> {
        let statement = self.prepare()?;
        self.execution.query(conn, &statement).await
    }

    pub async fn fetch_all(&mut self, conn: &impl Connection) -> OrmResult<Vec<Record>> {
        self.run(conn).await
    }

    /// First row, if any.
    pub async fn fetch_opt(&mut self, conn: &impl Connection) -> OrmResult<Option<Record>> {
        Ok(self.run(conn).await?.into_iter().next())
    }

    /// First row; `NotFound` when the result is empty.
    pub async fn fetch_one(&mut self, conn: &impl Connection) -> OrmResult<Record> {
        self.fetch_opt(conn).await?.ok_or_else(|| {
            OrmError::not_found(format!("no row in '{}' matched", self.from.table))
        })
    }

    pub async fn fetch_all_as<T: Entity>(&mut self, conn: &impl Connection) -> OrmResult<Vec<T>> {
        self.run(conn).await?.iter().map(T::from_record).collect()
    }

    pub async fn fetch_one_as<T: Entity>(&mut self, conn: &impl Connection) -> OrmResult<T> {
        T::from_record(&self.fetch_one(conn).await?)
    }

    /// Execute the count statement.
    pub async fn count(&mut self, conn: &impl Connection) -> OrmResult<u64> {
        let statement = self.count_statement()?;
        let rows = self.execution.query(conn, &statement).await?;
        let total = rows
            .first()
            .and_then(|row| row.get("total").or_else(|| row.values().next()))
            .cloned()
            .unwrap_or(Value::Int(0));
        total
            .as_u64()
            .ok_or_else(|| OrmError::decode("total", format!("expected a count, got {total}")))
    }

    execution_accessors!();
}

/// Escape LIKE wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
