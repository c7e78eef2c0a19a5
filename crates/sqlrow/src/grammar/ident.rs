//! Identifier quoting and column references.
//!
//! Every table and column name is rendered backtick-quoted (`` `t`.`c` ``) so
//! reserved words never collide. Embedded backticks are doubled.

use std::fmt;

/// Quote one identifier part.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Reduce arbitrary text to a binding-label-safe stem: `COUNT(*)` -> `count`.
pub fn sanitize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("expr");
    }
    out
}

/// A column, optionally qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Parse `column` or `table.column`.
    pub fn parse(s: &str) -> Self {
        match s.split_once('.') {
            Some((table, column)) => Self::qualified(table.trim(), column.trim()),
            None => Self::new(s.trim()),
        }
    }

    /// Qualify with `table` unless already qualified.
    pub fn or_table(mut self, table: &str) -> Self {
        if self.table.is_none() {
            self.table = Some(table.to_string());
        }
        self
    }

    /// `table_column` (or `column`), label-safe.
    ///
    /// Not injective: `u_user`.`id` and `u`.`user_id` share the stem
    /// `u_user_id`. A repeated label within one clause, or across the joins
    /// of one statement, gets a `_2`, `_3`, ... suffix.
    pub fn label_stem(&self) -> String {
        match &self.table {
            Some(t) => sanitize_label(&format!("{t}_{}", self.column)),
            None => sanitize_label(&self.column),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            write!(f, "{}.", quote_ident(table))?;
        }
        if self.column == "*" {
            f.write_str("*")
        } else {
            f.write_str(&quote_ident(&self.column))
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for ColumnRef {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<(&str, &str)> for ColumnRef {
    fn from((table, column): (&str, &str)) -> Self {
        Self::qualified(table, column)
    }
}
