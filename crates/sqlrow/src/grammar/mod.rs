//! Statement Grammar: identifiers, predicates, condition trees and clauses.
//!
//! Generated SQL uses backtick-quoted identifiers and named `:label`
//! placeholders only.

mod clause;
mod condition;
mod ident;
mod predicate;

pub use clause::{
    Clause, ColumnList, Direction, Filter, FilterKind, GroupBy, Join, JoinKind, Limit, OrderBy,
    Projection, SelectFrom, Set,
};
pub use condition::Condition;
pub use ident::{ColumnRef, quote_ident, sanitize_label};
pub use predicate::{Operand, Operator, Predicate};
