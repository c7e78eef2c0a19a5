//! Atomic conditions with named-placeholder bindings.
//!
//! A [`Predicate`] owns its values; the `:label` placeholders it renders are
//! derived from `<purpose>_<table>_<column>` (or an explicit label), so
//! rendering is pure and can be repeated without touching binding state.

use std::collections::BTreeSet;
use std::fmt;

use super::ident::{ColumnRef, sanitize_label};
use crate::error::OrmResult;
use crate::value::{Bindings, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
    NotBetween,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
        }
    }
}

/// A column reference or an unquoted SQL expression such as `COUNT(*)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Column(ColumnRef),
    Raw(String),
}

impl Operand {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    fn label_stem(&self) -> String {
        match self {
            Self::Column(c) => c.label_stem(),
            Self::Raw(sql) => sanitize_label(sql),
        }
    }

    pub(crate) fn or_table(self, table: &str) -> Self {
        match self {
            Self::Column(c) => Self::Column(c.or_table(table)),
            raw => raw,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => write!(f, "{c}"),
            Self::Raw(sql) => f.write_str(sql),
        }
    }
}

impl From<ColumnRef> for Operand {
    fn from(c: ColumnRef) -> Self {
        Self::Column(c)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Self::Column(ColumnRef::parse(s))
    }
}

impl From<String> for Operand {
    fn from(s: String) -> Self {
        Self::Column(ColumnRef::parse(&s))
    }
}

impl From<(&str, &str)> for Operand {
    fn from(pair: (&str, &str)) -> Self {
        Self::Column(pair.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Rhs {
    Nothing,
    Operand(Operand),
    Value(Value),
    List(Vec<Value>),
    Range(Value, Value),
}

/// One comparison: `left op right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    left: Operand,
    op: Operator,
    right: Rhs,
    purpose: String,
    label: Option<String>,
    suffix: usize,
}

impl Predicate {
    pub fn new(left: impl Into<Operand>, op: Operator) -> Self {
        Self {
            left: left.into(),
            op,
            right: Rhs::Nothing,
            purpose: "where".to_string(),
            label: None,
            suffix: 1,
        }
    }

    /// Bind a single value. `= NULL` / `!= NULL` become `IS [NOT] NULL`.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        match (self.op, value.is_null()) {
            (Operator::Eq, true) => {
                self.op = Operator::IsNull;
                self.right = Rhs::Nothing;
            }
            (Operator::NotEq, true) => {
                self.op = Operator::IsNotNull;
                self.right = Rhs::Nothing;
            }
            _ => self.right = Rhs::Value(value),
        }
        self
    }

    /// Bind a list for `IN` / `NOT IN`, one placeholder per element.
    pub fn with_values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.right = Rhs::List(values.into_iter().map(Into::into).collect());
        self
    }

    /// Bind both ends of a `BETWEEN`.
    pub fn with_range(mut self, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.right = Rhs::Range(from.into(), to.into());
        self
    }

    /// Compare against another column or a raw expression (no binding).
    pub fn with_operand(mut self, right: impl Into<Operand>) -> Self {
        self.right = Rhs::Operand(right.into());
        self
    }

    /// Use an explicit label instead of the derived one.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the clause purpose used in derived labels (`where`, `having`, `join`).
    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }

    pub fn eq(column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Eq).with_value(value)
    }

    pub fn ne(column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::NotEq).with_value(value)
    }

    pub fn lt(column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Lt).with_value(value)
    }

    pub fn lte(column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::LtEq).with_value(value)
    }

    pub fn gt(column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Gt).with_value(value)
    }

    pub fn gte(column: impl Into<Operand>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::GtEq).with_value(value)
    }

    pub fn like(column: impl Into<Operand>, pattern: impl Into<Value>) -> Self {
        Self::new(column, Operator::Like).with_value(pattern)
    }

    pub fn not_like(column: impl Into<Operand>, pattern: impl Into<Value>) -> Self {
        Self::new(column, Operator::NotLike).with_value(pattern)
    }

    pub fn in_list<V: Into<Value>>(
        column: impl Into<Operand>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(column, Operator::In).with_values(values)
    }

    pub fn not_in<V: Into<Value>>(
        column: impl Into<Operand>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(column, Operator::NotIn).with_values(values)
    }

    pub fn is_null(column: impl Into<Operand>) -> Self {
        Self::new(column, Operator::IsNull)
    }

    pub fn is_not_null(column: impl Into<Operand>) -> Self {
        Self::new(column, Operator::IsNotNull)
    }

    pub fn between(
        column: impl Into<Operand>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        Self::new(column, Operator::Between).with_range(from, to)
    }

    /// `left = right` between two columns, as used in join conditions.
    pub fn columns_eq(left: impl Into<ColumnRef>, right: impl Into<ColumnRef>) -> Self {
        Self::new(Operand::Column(left.into()), Operator::Eq)
            .with_operand(Operand::Column(right.into()))
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn left(&self) -> &Operand {
        &self.left
    }

    /// Base label (without list index or range suffix).
    pub fn base_label(&self) -> String {
        let base = match &self.label {
            Some(explicit) => sanitize_label(explicit),
            None => format!("{}_{}", sanitize_label(&self.purpose), self.left.label_stem()),
        };
        if self.suffix > 1 {
            format!("{base}_{}", self.suffix)
        } else {
            base
        }
    }

    /// Every label this predicate binds, in placeholder order.
    pub fn labels(&self) -> Vec<String> {
        let base = self.base_label();
        match &self.right {
            Rhs::Value(_) => vec![base],
            Rhs::List(values) => (0..values.len()).map(|i| format!("{base}_{i}")).collect(),
            Rhs::Range(_, _) => vec![format!("{base}_from"), format!("{base}_to")],
            Rhs::Nothing | Rhs::Operand(_) => Vec::new(),
        }
    }

    pub fn collect_bindings(&self, out: &mut Bindings) -> OrmResult<()> {
        let labels = self.labels();
        let values: Vec<&Value> = match &self.right {
            Rhs::Value(v) => vec![v],
            Rhs::List(vs) => vs.iter().collect(),
            Rhs::Range(from, to) => vec![from, to],
            Rhs::Nothing | Rhs::Operand(_) => Vec::new(),
        };
        for (label, value) in labels.iter().zip(values) {
            out.bind(label, value.clone())?;
        }
        Ok(())
    }

    pub(crate) fn set_purpose(&mut self, purpose: &str) {
        self.purpose = purpose.to_string();
    }

    pub(crate) fn qualify(&mut self, table: &str) {
        self.left = std::mem::replace(&mut self.left, Operand::Raw(String::new())).or_table(table);
    }

    /// Bump the suffix until none of this predicate's labels is taken, then claim them.
    pub(crate) fn claim_labels(&mut self, used: &mut BTreeSet<String>) {
        self.suffix = 1;
        while self.labels().iter().any(|l| used.contains(l)) {
            self.suffix += 1;
        }
        used.extend(self.labels());
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels();
        match (&self.right, self.op) {
            (Rhs::List(values), Operator::In) if values.is_empty() => f.write_str("1=0"),
            (Rhs::List(values), Operator::NotIn) if values.is_empty() => f.write_str("1=1"),
            (Rhs::List(_), op) => {
                let placeholders: Vec<String> = labels.iter().map(|l| format!(":{l}")).collect();
                write!(f, "{} {} ({})", self.left, op.as_sql(), placeholders.join(", "))
            }
            (Rhs::Range(_, _), op) => write!(
                f,
                "{} {} :{} AND :{}",
                self.left,
                op.as_sql(),
                labels[0],
                labels[1]
            ),
            (Rhs::Value(_), op) => write!(f, "{} {} :{}", self.left, op.as_sql(), labels[0]),
            (Rhs::Operand(right), op) => write!(f, "{} {} {}", self.left, op.as_sql(), right),
            (Rhs::Nothing, op) => write!(f, "{} {}", self.left, op.as_sql()),
        }
    }
}
