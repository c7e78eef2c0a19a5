use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::attribute::ColumnAttribute;
use crate::error::{OrmError, OrmResult};
use crate::value::Record;

/// Referential action of a foreign key (`ON DELETE` / `ON UPDATE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
    NoAction,
}

impl ReferentialAction {
    pub fn from_rule(rule: &str) -> Self {
        match rule.trim().to_ascii_uppercase().as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            "NO ACTION" => Self::NoAction,
            _ => Self::Restrict,
        }
    }
}

/// A single-column foreign key owned by `column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub constraint: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueKey {
    pub name: String,
    pub columns: Vec<String>,
}

/// Structure of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnAttribute>,
    pub primary_keys: Vec<String>,
    pub auto_increment: Option<String>,
    /// Unique constraints in declaration order.
    pub unique_keys: Vec<UniqueKey>,
    /// Foreign keys in column order.
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnAttribute> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Collect `columns` out of `data`, provided every non-nullable one is present.
    fn match_columns<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a String>,
        data: &Record,
    ) -> Option<Record> {
        let mut matched = Record::new();
        for name in columns {
            let nullable = self.column(name).is_some_and(|c| c.nullable);
            match data.get(name) {
                Some(value) if !value.is_null() => {
                    matched.insert(name.clone(), value.clone());
                }
                _ if nullable => {}
                _ => return None,
            }
        }
        (!matched.is_empty()).then_some(matched)
    }
}

/// Structured, immutable view of a database schema.
///
/// Built once from catalog metadata (see [`SchemaCatalog::from_metadata`]) and
/// shared read-only by queries, rows and relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, TableSchema>,
}

impl SchemaCatalog {
    pub fn from_tables(tables: impl IntoIterator<Item = TableSchema>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Table names in sorted order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, table: &str) -> OrmResult<&TableSchema> {
        self.tables
            .get(table)
            .ok_or_else(|| OrmError::TableNotFound(table.to_string()))
    }

    pub fn columns(&self, table: &str) -> OrmResult<&[ColumnAttribute]> {
        Ok(&self.table(table)?.columns)
    }

    pub fn column(&self, table: &str, column: &str) -> OrmResult<&ColumnAttribute> {
        self.table(table)?
            .column(column)
            .ok_or_else(|| OrmError::column_not_found(table, column))
    }

    /// Alias of [`SchemaCatalog::column`].
    pub fn attribute(&self, table: &str, column: &str) -> OrmResult<&ColumnAttribute> {
        self.column(table, column)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|t| t.has_column(column))
    }

    pub fn primary_keys(&self, table: &str) -> OrmResult<&[String]> {
        Ok(&self.table(table)?.primary_keys)
    }

    pub fn auto_incremented_primary_key(&self, table: &str) -> OrmResult<Option<&str>> {
        Ok(self.table(table)?.auto_increment.as_deref())
    }

    pub fn foreign_keys(&self, table: &str) -> OrmResult<&[ForeignKey]> {
        Ok(&self.table(table)?.foreign_keys)
    }

    pub fn unique_keys(&self, table: &str) -> OrmResult<&[UniqueKey]> {
        Ok(&self.table(table)?.unique_keys)
    }

    /// Foreign keys of `from` that reference `to`, in column order.
    pub fn foreign_keys_to(&self, from: &str, to: &str) -> Vec<&ForeignKey> {
        self.tables
            .get(from)
            .map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| fk.referenced_table == to)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every foreign key pointing at `table`, as `(owning table, key)`.
    pub fn referencing(&self, table: &str) -> Vec<(&str, &ForeignKey)> {
        self.tables
            .values()
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(move |fk| fk.referenced_table == table)
                    .map(move |fk| (t.name.as_str(), fk))
            })
            .collect()
    }

    /// Primary-key subset of `data`, if every non-nullable key column is present.
    pub fn match_primary_keys(&self, table: &str, data: &Record) -> OrmResult<Option<Record>> {
        let schema = self.table(table)?;
        if schema.primary_keys.is_empty() {
            return Err(OrmError::NoPrimaryKeysDefined(table.to_string()));
        }
        Ok(schema.match_columns(&schema.primary_keys, data))
    }

    /// First unique constraint (declaration order) fully covered by `data`.
    pub fn match_unique_keys(&self, table: &str, data: &Record) -> OrmResult<Option<Record>> {
        let schema = self.table(table)?;
        Ok(schema
            .unique_keys
            .iter()
            .find_map(|key| schema.match_columns(&key.columns, data)))
    }

    /// Primary-key match, falling back to a unique-key match.
    pub fn match_uniqueness(&self, table: &str, data: &Record) -> OrmResult<Option<Record>> {
        let schema = self.table(table)?;
        if !schema.primary_keys.is_empty() {
            if let Some(found) = schema.match_columns(&schema.primary_keys, data) {
                return Ok(Some(found));
            }
        }
        self.match_unique_keys(table, data)
    }

    /// Keep only columns known to `table`.
    pub fn filter_known(&self, table: &str, data: &Record) -> OrmResult<Record> {
        let schema = self.table(table)?;
        Ok(data
            .iter()
            .filter(|(k, _)| schema.has_column(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
