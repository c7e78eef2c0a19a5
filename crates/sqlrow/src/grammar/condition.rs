//! Condition trees for WHERE/HAVING/ON clauses.
//!
//! AND groups nested inside OR (and vice versa) are parenthesized, as are raw
//! fragments sharing a group with other members. Empty groups render to
//! nothing and are skipped by their parent.

use std::collections::BTreeSet;
use std::fmt;

use super::ident::ColumnRef;
use super::predicate::Predicate;
use crate::error::OrmResult;
use crate::value::{Bindings, Record};

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Predicate(Predicate),
    /// AND group: all conditions must be true.
    All(Vec<Condition>),
    /// OR group: at least one condition must be true.
    Any(Vec<Condition>),
    Not(Box<Condition>),
    /// Raw SQL fragment without bindings.
    Raw(String),
}

impl Condition {
    pub fn all(conditions: impl IntoIterator<Item = impl Into<Condition>>) -> Self {
        Self::All(conditions.into_iter().map(Into::into).collect())
    }

    pub fn any(conditions: impl IntoIterator<Item = impl Into<Condition>>) -> Self {
        Self::Any(conditions.into_iter().map(Into::into).collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: impl Into<Condition>) -> Self {
        Self::Not(Box::new(condition.into()))
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Equality on every entry of `record`, columns qualified with `table`.
    pub fn matching(table: &str, record: &Record) -> Self {
        Self::All(
            record
                .iter()
                .map(|(column, value)| {
                    Self::Predicate(Predicate::eq(
                        ColumnRef::qualified(table, column.as_str()),
                        value.clone(),
                    ))
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::All(cs) | Self::Any(cs) => cs.iter().all(Condition::is_empty),
            Self::Not(inner) => inner.is_empty(),
            Self::Raw(sql) => sql.trim().is_empty(),
            Self::Predicate(_) => false,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Predicate(p) => p.to_string(),
            Self::All(cs) => join_group(cs, " AND ", |c| matches!(c, Self::Any(_))),
            Self::Any(cs) => join_group(cs, " OR ", |c| matches!(c, Self::All(_))),
            Self::Not(inner) => {
                let sql = inner.render();
                if sql.is_empty() {
                    sql
                } else {
                    format!("NOT ({sql})")
                }
            }
            Self::Raw(sql) => sql.clone(),
        }
    }

    pub fn collect_bindings(&self, out: &mut Bindings) -> OrmResult<()> {
        match self {
            Self::Predicate(p) => p.collect_bindings(out),
            Self::All(cs) | Self::Any(cs) => cs.iter().try_for_each(|c| c.collect_bindings(out)),
            Self::Not(inner) => inner.collect_bindings(out),
            Self::Raw(_) => Ok(()),
        }
    }

    pub(crate) fn for_each_predicate_mut(&mut self, f: &mut dyn FnMut(&mut Predicate)) {
        match self {
            Self::Predicate(p) => f(p),
            Self::All(cs) | Self::Any(cs) => {
                for c in cs {
                    c.for_each_predicate_mut(f);
                }
            }
            Self::Not(inner) => inner.for_each_predicate_mut(f),
            Self::Raw(_) => {}
        }
    }

    /// Re-purpose and de-duplicate every predicate's labels against `used`.
    pub(crate) fn adopt(&mut self, purpose: &str, used: &mut BTreeSet<String>) {
        self.for_each_predicate_mut(&mut |p| {
            p.set_purpose(purpose);
            p.claim_labels(used);
        });
    }
}

fn join_group(
    conditions: &[Condition],
    separator: &str,
    needs_parens: impl Fn(&Condition) -> bool,
) -> String {
    let members: Vec<&Condition> = conditions.iter().filter(|c| !c.is_empty()).collect();
    let shared = members.len() > 1;
    members
        .into_iter()
        .map(|c| {
            let sql = c.render();
            if needs_parens(c) || (shared && matches!(c, Condition::Raw(_))) {
                format!("({sql})")
            } else {
                sql
            }
        })
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<Predicate> for Condition {
    fn from(p: Predicate) -> Self {
        Self::Predicate(p)
    }
}
