//! Clause objects: each renders one statement fragment and owns its bindings.

use std::collections::BTreeSet;
use std::fmt;

use super::condition::Condition;
use super::ident::{ColumnRef, quote_ident, sanitize_label};
use super::predicate::{Operand, Predicate};
use crate::error::OrmResult;
use crate::value::{Bindings, Value};

/// A renderable statement fragment.
///
/// `Display` must be pure: rendering never changes binding state.
pub trait Clause: fmt::Display {
    /// An empty clause is omitted from the statement.
    fn is_empty(&self) -> bool {
        false
    }

    fn collect_bindings(&self, _out: &mut Bindings) -> OrmResult<()> {
        Ok(())
    }
}

/// One entry of a SELECT list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    /// Computed column: `<sql> AS <alias>`. The SQL is not quoted.
    Expr { sql: String, alias: String },
}

impl Projection {
    pub fn column(column: impl Into<ColumnRef>) -> Self {
        Self::Column {
            column: column.into(),
            alias: None,
        }
    }

    pub fn aliased(column: impl Into<ColumnRef>, alias: impl Into<String>) -> Self {
        Self::Column {
            column: column.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn expr(alias: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Expr {
            sql: sql.into(),
            alias: alias.into(),
        }
    }

    /// `table.*`
    pub fn all_of(table: impl Into<String>) -> Self {
        Self::column(ColumnRef::qualified(table, "*"))
    }

    pub(crate) fn or_table(self, table: &str) -> Self {
        match self {
            Self::Column { column, alias } => Self::Column {
                column: column.or_table(table),
                alias,
            },
            expr => expr,
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { column, alias } => {
                write!(f, "{column}")?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", quote_ident(alias))?;
                }
                Ok(())
            }
            Self::Expr { sql, alias } => write!(f, "{sql} AS {}", quote_ident(alias)),
        }
    }
}

impl From<&str> for Projection {
    fn from(s: &str) -> Self {
        Self::column(s)
    }
}

impl From<String> for Projection {
    fn from(s: String) -> Self {
        Self::column(s)
    }
}

impl From<(&str, &str)> for Projection {
    fn from(pair: (&str, &str)) -> Self {
        Self::column(pair)
    }
}

impl From<ColumnRef> for Projection {
    fn from(c: ColumnRef) -> Self {
        Self::column(c)
    }
}

/// `SELECT ... FROM <table> [AS <alias>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectFrom {
    pub table: String,
    pub alias: Option<String>,
    pub projections: Vec<Projection>,
}

impl SelectFrom {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            projections: Vec::new(),
        }
    }

    /// The name other clauses use to refer to the base table.
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

impl fmt::Display for SelectFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.projections.is_empty() {
            write!(f, "{}", Projection::all_of(self.reference()))?;
        } else {
            let list: Vec<String> = self.projections.iter().map(ToString::to_string).collect();
            f.write_str(&list.join(", "))?;
        }
        write!(f, " FROM {}", quote_ident(&self.table))?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", quote_ident(alias))?;
        }
        Ok(())
    }
}

impl Clause for SelectFrom {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::LeftOuter => "LEFT OUTER JOIN",
            Self::RightOuter => "RIGHT OUTER JOIN",
        }
    }
}

/// `<kind> JOIN <table> [AS <alias>] ON <conditions>`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
    on: Vec<Condition>,
    labels: BTreeSet<String>,
}

impl Join {
    pub fn new(kind: JoinKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: None,
            on: Vec::new(),
            labels: BTreeSet::new(),
        }
    }

    pub fn inner(table: impl Into<String>) -> Self {
        Self::new(JoinKind::Inner, table)
    }

    pub fn left(table: impl Into<String>) -> Self {
        Self::new(JoinKind::LeftOuter, table)
    }

    pub fn right(table: impl Into<String>) -> Self {
        Self::new(JoinKind::RightOuter, table)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add an ON condition. Bound values get `join_` labels.
    pub fn on(mut self, condition: impl Into<Condition>) -> Self {
        let mut condition = condition.into();
        condition.adopt("join", &mut self.labels);
        self.on.push(condition);
        self
    }

    /// `ON left = right` between two columns.
    pub fn on_columns(self, left: impl Into<ColumnRef>, right: impl Into<ColumnRef>) -> Self {
        self.on(Predicate::columns_eq(left, right))
    }

    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    pub fn has_conditions(&self) -> bool {
        self.on.iter().any(|c| !c.is_empty())
    }

    pub(crate) fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// Re-derive the ON labels so none is in `taken`.
    pub(crate) fn relabel(&mut self, taken: &BTreeSet<String>) {
        let mut used = taken.clone();
        for condition in &mut self.on {
            condition.adopt("join", &mut used);
        }
        self.labels = used.difference(taken).cloned().collect();
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_sql(), quote_ident(&self.table))?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", quote_ident(alias))?;
        }
        let on = Condition::All(self.on.clone()).render();
        if !on.is_empty() {
            write!(f, " ON {on}")?;
        }
        Ok(())
    }
}

impl Clause for Join {
    fn collect_bindings(&self, out: &mut Bindings) -> OrmResult<()> {
        self.on.iter().try_for_each(|c| c.collect_bindings(out))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Where,
    Having,
}

impl FilterKind {
    fn keyword(self) -> &'static str {
        match self {
            Self::Where => "WHERE",
            Self::Having => "HAVING",
        }
    }

    fn purpose(self) -> &'static str {
        match self {
            Self::Where => "where",
            Self::Having => "having",
        }
    }
}

/// A WHERE or HAVING clause: conditions joined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    kind: FilterKind,
    conditions: Vec<Condition>,
    labels: BTreeSet<String>,
}

impl Filter {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
            labels: BTreeSet::new(),
        }
    }

    pub fn where_clause() -> Self {
        Self::new(FilterKind::Where)
    }

    pub fn having() -> Self {
        Self::new(FilterKind::Having)
    }

    /// Add a condition. A label already used in this clause gets a `_2`, `_3`, ... suffix.
    pub fn push(&mut self, condition: impl Into<Condition>) {
        let mut condition = condition.into();
        condition.adopt(self.kind.purpose(), &mut self.labels);
        self.conditions.push(condition);
    }

    /// Qualify unqualified columns of every predicate with `table`, then add.
    pub(crate) fn push_qualified(&mut self, condition: impl Into<Condition>, table: &str) {
        let mut condition = condition.into();
        condition.for_each_predicate_mut(&mut |p| p.qualify(table));
        self.push(condition);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = Condition::All(self.conditions.clone()).render();
        if body.is_empty() {
            return Ok(());
        }
        write!(f, "{} {body}", self.kind.keyword())
    }
}

impl Clause for Filter {
    fn is_empty(&self) -> bool {
        self.conditions.iter().all(Condition::is_empty)
    }

    fn collect_bindings(&self, out: &mut Bindings) -> OrmResult<()> {
        self.conditions.iter().try_for_each(|c| c.collect_bindings(out))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBy {
    pub terms: Vec<Operand>,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return Ok(());
        }
        let terms: Vec<String> = self.terms.iter().map(ToString::to_string).collect();
        write!(f, "GROUP BY {}", terms.join(", "))
    }
}

impl Clause for GroupBy {
    fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    pub terms: Vec<(Operand, Direction)>,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return Ok(());
        }
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|(term, dir)| format!("{term} {}", dir.as_sql()))
            .collect();
        write!(f, "ORDER BY {}", terms.join(", "))
    }
}

impl Clause for OrderBy {
    fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limit {
    pub count: Option<u64>,
    pub offset: Option<u64>,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.count, self.offset) {
            (Some(count), Some(offset)) => write!(f, "LIMIT {count} OFFSET {offset}"),
            (Some(count), None) => write!(f, "LIMIT {count}"),
            // The engine needs a row count to accept an offset.
            (None, Some(offset)) => write!(f, "LIMIT {} OFFSET {offset}", u64::MAX),
            (None, None) => Ok(()),
        }
    }
}

impl Clause for Limit {
    fn is_empty(&self) -> bool {
        self.count.is_none() && self.offset.is_none()
    }
}

/// `SET col = :set_<table>_<col>, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    table: String,
    assignments: Vec<(String, Value)>,
}

impl Set {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
        }
    }

    /// Assign a column; assigning the same column twice keeps the last value.
    pub fn assign(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.assignments.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = value,
            None => self.assignments.push((column, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    fn label(&self, column: &str) -> String {
        format!("set_{}", sanitize_label(&format!("{}_{column}", self.table)))
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.assignments.is_empty() {
            return Ok(());
        }
        let parts: Vec<String> = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{} = :{}", quote_ident(column), self.label(column)))
            .collect();
        write!(f, "SET {}", parts.join(", "))
    }
}

impl Clause for Set {
    fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn collect_bindings(&self, out: &mut Bindings) -> OrmResult<()> {
        for (column, value) in &self.assignments {
            out.bind(&self.label(column), value.clone())?;
        }
        Ok(())
    }
}

/// Column list plus matching `:label` value list for INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnList {
    table: String,
    entries: Vec<(String, Value)>,
}

impl ColumnList {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.entries.push((column.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    fn label(&self, column: &str) -> String {
        format!("insert_{}", sanitize_label(&format!("{}_{column}", self.table)))
    }

    /// `(`a`, `b`)`
    pub fn columns_sql(&self) -> String {
        let cols: Vec<String> = self.entries.iter().map(|(c, _)| quote_ident(c)).collect();
        format!("({})", cols.join(", "))
    }

    /// `(:insert_t_a, :insert_t_b)`
    pub fn values_sql(&self) -> String {
        let vals: Vec<String> = self
            .entries
            .iter()
            .map(|(c, _)| format!(":{}", self.label(c)))
            .collect();
        format!("({})", vals.join(", "))
    }
}

impl fmt::Display for ColumnList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} VALUES {}", self.columns_sql(), self.values_sql())
    }
}

impl Clause for ColumnList {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn collect_bindings(&self, out: &mut Bindings) -> OrmResult<()> {
        for (column, value) in &self.entries {
            out.bind(&self.label(column), value.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_from_defaults_to_base_star() {
        let mut from = SelectFrom::new("orders");
        assert_eq!(from.to_string(), "SELECT `orders`.* FROM `orders`");
        from.alias = Some("o".into());
        assert_eq!(from.to_string(), "SELECT `o`.* FROM `orders` AS `o`");
    }

    #[test]
    fn projections() {
        assert_eq!(Projection::from(("u", "email")).to_string(), "`u`.`email`");
        assert_eq!(
            Projection::aliased("u.email", "user_email").to_string(),
            "`u`.`email` AS `user_email`"
        );
        assert_eq!(Projection::expr("n", "COUNT(*)").to_string(), "COUNT(*) AS `n`");
    }

    #[test]
    fn join_renders_kind_alias_and_condition() {
        let join = Join::inner("users").on_columns("orders.user_id", "users.id");
        assert_eq!(
            join.to_string(),
            "INNER JOIN `users` ON `orders`.`user_id` = `users`.`id`"
        );

        let join = Join::left("users")
            .alias("buyer")
            .on_columns("orders.user_id", "buyer.id")
            .on(Predicate::eq("buyer.active", true));
        assert_eq!(
            join.to_string(),
            "LEFT OUTER JOIN `users` AS `buyer` ON `orders`.`user_id` = `buyer`.`id` AND `buyer`.`active` = :join_buyer_active"
        );
        let mut bindings = Bindings::new();
        join.collect_bindings(&mut bindings).unwrap();
        assert_eq!(bindings.get("join_buyer_active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn filter_relabels_for_having_and_disambiguates() {
        let mut having = Filter::having();
        having.push(Predicate::gt(Operand::raw("COUNT(*)"), 1));
        having.push(Predicate::lt(Operand::raw("COUNT(*)"), 10));
        assert_eq!(
            having.to_string(),
            "HAVING COUNT(*) > :having_count AND COUNT(*) < :having_count_2"
        );
        assert!(Filter::where_clause().to_string().is_empty());
    }

    #[test]
    fn order_group_limit() {
        let order = OrderBy {
            terms: vec![("t.a".into(), Direction::Desc), (Operand::raw("RAND()"), Direction::Asc)],
        };
        assert_eq!(order.to_string(), "ORDER BY `t`.`a` DESC, RAND() ASC");

        let group = GroupBy {
            terms: vec!["t.a".into()],
        };
        assert_eq!(group.to_string(), "GROUP BY `t`.`a`");

        let limit = Limit {
            count: Some(10),
            offset: Some(20),
        };
        assert_eq!(limit.to_string(), "LIMIT 10 OFFSET 20");
        assert!(Limit::default().is_empty());
    }

    #[test]
    fn set_and_column_list_use_table_qualified_labels() {
        let mut set = Set::new("orders");
        set.assign("status", Value::from("shipped"));
        assert_eq!(set.to_string(), "SET `status` = :set_orders_status");

        let mut list = ColumnList::new("orders");
        list.push("user_id", Value::Int(1));
        list.push("status", Value::from("new"));
        assert_eq!(
            list.to_string(),
            "(`user_id`, `status`) VALUES (:insert_orders_user_id, :insert_orders_status)"
        );
        let mut bindings = Bindings::new();
        list.collect_bindings(&mut bindings).unwrap();
        assert_eq!(bindings.len(), 2);
    }
}
