//! Foreign-key driven join resolution.
//!
//! [`AutoJoin`] brings a table into a [`Select`] by searching the catalog's
//! foreign keys, in this order:
//!
//! 1. a single foreign key from the base table to the target;
//! 2. a single foreign key from the target to the base table;
//! 3. a single already-joined table holding a single foreign key to the target;
//! 4. a single third table referenced once by both the base and the target.
//!
//! A step with more than one candidate is skipped rather than guessed. When
//! no step applies nothing is joined; the engine then reports the unresolved
//! table if the caller references it.

use crate::error::{OrmError, OrmResult};
use crate::grammar::{ColumnRef, Join, JoinKind, Projection};
use crate::query::Select;
use crate::schema::{ForeignKey, SchemaCatalog};

/// Audit trail reference, never eager-loaded.
const AUDIT_FOREIGN_KEY: &str = "action_id";

#[derive(Debug, Clone, Copy)]
pub struct AutoJoin<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> AutoJoin<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Join `table` (optionally as `alias`) into `select`.
    ///
    /// Returns `Ok(false)` when no unambiguous path exists, or when the table
    /// is already part of the statement and no new alias is requested. An
    /// alias already bound to another table fails with `AliasConflict`.
    pub fn join(&self, select: &mut Select, table: &str, alias: Option<&str>) -> OrmResult<bool> {
        self.catalog.table(table)?;
        match alias {
            Some(alias) => match select.table_for(alias) {
                Some(existing) if existing == table => return Ok(false),
                Some(existing) => {
                    return Err(OrmError::AliasConflict {
                        alias: alias.to_string(),
                        existing: existing.to_string(),
                        requested: table.to_string(),
                    });
                }
                None => {}
            },
            None if select.is_joined(table) => return Ok(false),
            None => {}
        }

        let base = select.base_table().to_string();
        let base_ref = select.base_alias().to_string();
        let reference = alias.unwrap_or(table);

        if let [fk] = self.catalog.foreign_keys_to(&base, table).as_slice() {
            let join = target(self.forward_kind(&base, fk)?, table, alias)
                .on_columns(
                    (base_ref.as_str(), fk.column.as_str()),
                    (reference, fk.referenced_column.as_str()),
                );
            select.push_join(join)?;
            return Ok(true);
        }

        if let [fk] = self.catalog.foreign_keys_to(table, &base).as_slice() {
            let join = target(JoinKind::LeftOuter, table, alias)
                .on_columns(
                    (base_ref.as_str(), fk.referenced_column.as_str()),
                    (reference, fk.column.as_str()),
                );
            select.push_join(join)?;
            return Ok(true);
        }

        if let Some((via_ref, via_table, fk)) = self.bridge(select, table) {
            let join = target(self.forward_kind(&via_table, &fk)?, table, alias)
                .on_columns(
                    (via_ref.as_str(), fk.column.as_str()),
                    (reference, fk.referenced_column.as_str()),
                );
            select.push_join(join)?;
            return Ok(true);
        }

        if let Some((third, from_base, from_target)) = self.shared_neighbor(&base, table) {
            let third_ref = match select
                .joins()
                .iter()
                .find(|j| j.table == third)
                .map(|j| j.reference().to_string())
            {
                Some(existing) => existing,
                None => {
                    let first = Join::new(self.forward_kind(&base, &from_base)?, third.clone())
                        .on_columns(
                            (base_ref.as_str(), from_base.column.as_str()),
                            (third.as_str(), from_base.referenced_column.as_str()),
                        );
                    select.push_join(first)?;
                    third.clone()
                }
            };
            let second = target(JoinKind::LeftOuter, table, alias)
                .on_columns(
                    (third_ref.as_str(), from_target.referenced_column.as_str()),
                    (reference, from_target.column.as_str()),
                );
            select.push_join(second)?;
            return Ok(true);
        }

        tracing::debug!(target: "sqlrow.sql", base = %base, table, "no unambiguous join path");
        Ok(false)
    }

    /// Join every table the base table references and project its columns as
    /// `<alias>_<column>`. Returns the number of joins added.
    ///
    /// The alias is the foreign-key column with its `_<referenced column>`
    /// suffix removed (`user_id` -> `user`), or the referenced table name.
    /// An alias taken by another table gets a `_2`, `_3`, ... suffix; one
    /// already bound to the referenced table means it is loaded and skipped.
    pub fn eager(&self, select: &mut Select) -> OrmResult<usize> {
        let base = select.base_table().to_string();
        let base_ref = select.base_alias().to_string();
        let mut added = 0;

        for fk in self.catalog.foreign_keys(&base)? {
            if fk.column == AUDIT_FOREIGN_KEY {
                continue;
            }
            let Some(alias) = free_alias(select, fk) else {
                continue;
            };

            let join = target(self.forward_kind(&base, fk)?, &fk.referenced_table, Some(&alias))
                .on_columns(
                    (base_ref.as_str(), fk.column.as_str()),
                    (alias.as_str(), fk.referenced_column.as_str()),
                );
            select.push_join(join)?;

            for column in self.catalog.columns(&fk.referenced_table)? {
                select.push_also(Projection::aliased(
                    ColumnRef::qualified(alias.as_str(), column.name.as_str()),
                    format!("{alias}_{}", column.name),
                ));
            }
            added += 1;
        }
        Ok(added)
    }

    /// INNER for a mandatory foreign-key column, LEFT OUTER for a nullable one.
    fn forward_kind(&self, table: &str, fk: &ForeignKey) -> OrmResult<JoinKind> {
        let column = self.catalog.column(table, &fk.column)?;
        Ok(if column.nullable {
            JoinKind::LeftOuter
        } else {
            JoinKind::Inner
        })
    }

    fn bridge(&self, select: &Select, table: &str) -> Option<(String, String, ForeignKey)> {
        let mut candidates = Vec::new();
        for (reference, joined) in select.joined_tables() {
            if let [fk] = self.catalog.foreign_keys_to(joined, table).as_slice() {
                candidates.push((reference.to_string(), joined.to_string(), (*fk).clone()));
            }
        }
        if candidates.len() == 1 {
            candidates.pop()
        } else {
            None
        }
    }

    fn shared_neighbor(&self, base: &str, table: &str) -> Option<(String, ForeignKey, ForeignKey)> {
        let mut candidates: Vec<(String, ForeignKey, ForeignKey)> = self
            .catalog
            .tables()
            .filter(|t| *t != base && *t != table)
            .filter_map(|third| {
                let from_base = self.catalog.foreign_keys_to(base, third);
                let from_target = self.catalog.foreign_keys_to(table, third);
                match (from_base.as_slice(), from_target.as_slice()) {
                    ([a], [b]) => Some((third.to_string(), (*a).clone(), (*b).clone())),
                    _ => None,
                }
            })
            .collect();
        if candidates.len() == 1 {
            candidates.pop()
        } else {
            None
        }
    }
}

fn target(kind: JoinKind, table: &str, alias: Option<&str>) -> Join {
    let join = Join::new(kind, table);
    match alias {
        Some(alias) if alias != table => join.alias(alias),
        _ => join,
    }
}

/// First alias not bound to another table, or `None` when the referenced
/// table already sits under it.
fn free_alias(select: &Select, fk: &ForeignKey) -> Option<String> {
    let stem = eager_alias(fk);
    let mut alias = stem.clone();
    let mut n = 1;
    while let Some(bound) = select.table_for(&alias) {
        if bound == fk.referenced_table {
            return None;
        }
        n += 1;
        alias = format!("{stem}_{n}");
    }
    Some(alias)
}

fn eager_alias(fk: &ForeignKey) -> String {
    let suffix = format!("_{}", fk.referenced_column);
    match fk.column.strip_suffix(&suffix) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => fk.referenced_table.clone(),
    }
}
