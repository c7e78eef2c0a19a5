//! Associations backed by a dependent or pivot table.
//!
//! The shape is read from the foreign keys of that table:
//!
//! | foreign keys | relation |
//! |---|---|
//! | 1 (to the owner) | [`Relation::HasOne`] |
//! | 2 (owner, target) | [`Relation::ManyToMany`] |
//! | 3 (owner, target, qualifier) | [`Relation::ManyToManyQualified`] |
//!
//! A pivot whose two foreign keys both reference the owner (`user_friends`
//! with `user_id` and `friend_id`) links the owner table to itself: the
//! first key in column order is the owner side.
//!
//! A relation holds table and column names only; rows and key values are
//! passed to each operation.
//!
//! ```ignore
//! let roles = Relation::resolve(&catalog, "user_roles", "users", Some("roles"))?;
//! roles.replace(&conn, &user, &[Value::Int(1), Value::Int(3)], None).await?;
//! let linked = roles.fetch(&conn, &user, None).await?;
//! ```

use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::grammar::{Direction, Join, Predicate};
use crate::query::{Delete, Insert, Select};
use crate::row::Row;
use crate::schema::{ForeignKey, SchemaCatalog};
use crate::validation::ValidationErrors;
use crate::value::{Record, Value};

/// One foreign key of the relation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Column on the relation table
    pub column: String,
    pub table: String,
    pub referenced_column: String,
}

impl From<&ForeignKey> for Link {
    fn from(fk: &ForeignKey) -> Self {
        Self {
            column: fk.column.clone(),
            table: fk.referenced_table.clone(),
            referenced_column: fk.referenced_column.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// `table` holds at most one row per owner.
    HasOne { table: String, owner: Link },
    ManyToMany {
        pivot: String,
        owner: Link,
        target: Link,
    },
    /// Every link also carries a qualifier, e.g. the role a user plays on a
    /// project.
    ManyToManyQualified {
        pivot: String,
        owner: Link,
        target: Link,
        qualifier: Link,
    },
}

impl Relation {
    /// Classify `table` relative to `owner`.
    ///
    /// `target` picks the far side of a pivot; it is required when the
    /// pivot has three foreign keys and checked when it has two.
    pub fn resolve(
        catalog: &SchemaCatalog,
        table: &str,
        owner: &str,
        target: Option<&str>,
    ) -> OrmResult<Self> {
        let foreign_keys = catalog.foreign_keys(table)?;
        if let [first, second] = foreign_keys
            && first.referenced_table == owner
            && second.referenced_table == owner
        {
            if let Some(target) = target
                && target != owner
            {
                return Err(OrmError::InvalidRelation(format!(
                    "'{table}' links '{owner}' to itself, not to '{target}'"
                )));
            }
            let relation = Self::ManyToMany {
                pivot: table.to_string(),
                owner: Link::from(first),
                target: Link::from(second),
            };
            tracing::debug!(target: "sqlrow.row", table, owner, relation = ?relation, "resolved relation");
            return Ok(relation);
        }

        let owner_link = only_one(
            foreign_keys.iter().filter(|fk| fk.referenced_table == owner),
            || format!("'{table}' has no foreign key to '{owner}'"),
            || format!("'{table}' has several foreign keys to '{owner}'"),
        )?;
        let rest: Vec<&ForeignKey> = foreign_keys
            .iter()
            .filter(|fk| fk.referenced_table != owner)
            .collect();

        let relation = match (foreign_keys.len(), rest.as_slice()) {
            (1, []) => Self::HasOne {
                table: table.to_string(),
                owner: owner_link,
            },
            (2, [far]) => {
                if let Some(target) = target
                    && far.referenced_table != target
                {
                    return Err(OrmError::InvalidRelation(format!(
                        "'{table}' links '{owner}' to '{}', not '{target}'",
                        far.referenced_table
                    )));
                }
                Self::ManyToMany {
                    pivot: table.to_string(),
                    owner: owner_link,
                    target: Link::from(*far),
                }
            }
            (3, [_, _]) => {
                let target = target.ok_or_else(|| {
                    OrmError::InvalidRelation(format!(
                        "'{table}' has three foreign keys; name the target table"
                    ))
                })?;
                let target_link = only_one(
                    rest.iter().copied().filter(|fk| fk.referenced_table == target),
                    || format!("'{table}' has no foreign key to '{target}'"),
                    || format!("'{table}' has several foreign keys to '{target}'"),
                )?;
                let qualifier = rest
                    .iter()
                    .copied()
                    .find(|fk| fk.referenced_table != target)
                    .map(Link::from)
                    .ok_or_else(|| {
                        OrmError::InvalidRelation(format!("'{table}' has no qualifier key"))
                    })?;
                Self::ManyToManyQualified {
                    pivot: table.to_string(),
                    owner: owner_link,
                    target: target_link,
                    qualifier,
                }
            }
            (n, _) => {
                return Err(OrmError::InvalidRelation(format!(
                    "'{table}' has {n} foreign keys; expected 1 to 3 with one to '{owner}'"
                )));
            }
        };
        tracing::debug!(target: "sqlrow.row", table, owner, relation = ?relation, "resolved relation");
        Ok(relation)
    }

    /// The dependent or pivot table.
    pub fn table(&self) -> &str {
        match self {
            Self::HasOne { table, .. } => table,
            Self::ManyToMany { pivot, .. } | Self::ManyToManyQualified { pivot, .. } => pivot,
        }
    }

    pub fn owner(&self) -> &Link {
        match self {
            Self::HasOne { owner, .. }
            | Self::ManyToMany { owner, .. }
            | Self::ManyToManyQualified { owner, .. } => owner,
        }
    }

    pub fn target(&self) -> Option<&Link> {
        match self {
            Self::HasOne { .. } => None,
            Self::ManyToMany { target, .. } | Self::ManyToManyQualified { target, .. } => {
                Some(target)
            }
        }
    }

    pub fn qualifier(&self) -> Option<&Link> {
        match self {
            Self::ManyToManyQualified { qualifier, .. } => Some(qualifier),
            _ => None,
        }
    }

    /// Rows related to `owner`: the dependent row, or the targets linked
    /// through the pivot (restricted to `qualifier` when qualified).
    pub async fn fetch(
        &self,
        conn: &impl Connection,
        owner: &Row,
        qualifier: Option<&Value>,
    ) -> OrmResult<Vec<Row>> {
        let key = self.owner_key(owner)?;
        let scope = self.scope(qualifier)?;
        let owner_link = self.owner();

        let (table, mut select) = match self.target() {
            None => {
                let select = Select::new(self.table())
                    .where_eq(owner_link.column.as_str(), key)
                    .limit(2);
                (self.table(), select)
            }
            Some(target) => {
                let pivot = self.table();
                let mut select = Select::new(target.table.as_str())
                    .join(Join::inner(pivot).on_columns(
                        (pivot, target.column.as_str()),
                        (target.table.as_str(), target.referenced_column.as_str()),
                    ))?
                    .and_where(Predicate::eq((pivot, owner_link.column.as_str()), key));
                if let Some((link, value)) = scope {
                    select =
                        select.and_where(Predicate::eq((pivot, link.column.as_str()), value.clone()));
                }
                let select = select.order_by(
                    (target.table.as_str(), target.referenced_column.as_str()),
                    Direction::Asc,
                );
                (target.table.as_str(), select)
            }
        };

        let records = select.fetch_all(conn).await?;
        if self.target().is_none() && records.len() > 1 {
            return Err(OrmError::AmbiguousLoad {
                table: table.to_string(),
                matched: records.len(),
            });
        }
        records
            .into_iter()
            .map(|record| Row::from_loaded(owner.catalog().clone(), table, record))
            .collect()
    }

    /// The dependent row of a [`Relation::HasOne`], if any.
    pub async fn fetch_one(&self, conn: &impl Connection, owner: &Row) -> OrmResult<Option<Row>> {
        self.expect_has_one()?;
        Ok(self.fetch(conn, owner, None).await?.into_iter().next())
    }

    /// Insert or update the dependent row of a [`Relation::HasOne`].
    pub async fn save(
        &self,
        conn: &impl Connection,
        owner: &Row,
        mut data: Record,
    ) -> OrmResult<ValidationErrors> {
        self.expect_has_one()?;
        let key = self.owner_key(owner)?;
        data.insert(self.owner().column.clone(), key);

        let mut row = match self.fetch_one(conn, owner).await? {
            Some(mut existing) => {
                existing.alter(data)?;
                existing
            }
            None => Row::new(owner.catalog().clone(), self.table(), data)?,
        };
        row.persist(conn).await
    }

    /// Delete the dependent row of a [`Relation::HasOne`].
    pub async fn remove(&self, conn: &impl Connection, owner: &Row) -> OrmResult<u64> {
        self.expect_has_one()?;
        let key = self.owner_key(owner)?;
        let mut conditions = Record::new();
        conditions.insert(self.owner().column.clone(), key);
        Delete::new(owner.catalog(), self.table(), &conditions)?
            .run(conn)
            .await
    }

    /// Add one pivot row.
    pub async fn link(
        &self,
        conn: &impl Connection,
        owner: &Row,
        target: &Value,
        qualifier: Option<&Value>,
    ) -> OrmResult<()> {
        let data = self.pivot_record(owner, Some(target), qualifier)?;
        Insert::new(owner.catalog(), self.table(), &data)?
            .run(conn)
            .await?;
        Ok(())
    }

    /// Remove one pivot row. Returns the number of rows deleted.
    pub async fn unlink(
        &self,
        conn: &impl Connection,
        owner: &Row,
        target: &Value,
        qualifier: Option<&Value>,
    ) -> OrmResult<u64> {
        let conditions = self.pivot_record(owner, Some(target), qualifier)?;
        Delete::new(owner.catalog(), self.table(), &conditions)?
            .run(conn)
            .await
    }

    /// Make `targets` the complete set of links for `owner`.
    ///
    /// Deletes the owner's links (only those with `qualifier` when
    /// qualified) and inserts one per target, inside a transaction.
    pub async fn replace(
        &self,
        conn: &impl Connection,
        owner: &Row,
        targets: &[Value],
        qualifier: Option<&Value>,
    ) -> OrmResult<()> {
        let scope = self.pivot_record(owner, None, qualifier)?;
        let inserts = targets
            .iter()
            .map(|target| self.pivot_record(owner, Some(target), qualifier))
            .collect::<OrmResult<Vec<_>>>()?;
        let catalog = owner.catalog();
        let pivot = self.table();
        tracing::debug!(target: "sqlrow.row", pivot, links = inserts.len(), "replace links");

        crate::transaction!(conn, {
            Delete::new(catalog, pivot, &scope)?.run(conn).await?;
            for data in &inserts {
                Insert::new(catalog, pivot, data)?.run(conn).await?;
            }
            Ok(())
        })
    }

    fn expect_has_one(&self) -> OrmResult<()> {
        match self {
            Self::HasOne { .. } => Ok(()),
            _ => Err(OrmError::InvalidRelation(format!(
                "'{}' is a pivot table, not a dependent table",
                self.table()
            ))),
        }
    }

    fn owner_key(&self, owner: &Row) -> OrmResult<Value> {
        let link = self.owner();
        if owner.table() != link.table {
            return Err(OrmError::InvalidRelation(format!(
                "'{}' belongs to '{}', got a '{}' row",
                self.table(),
                link.table,
                owner.table()
            )));
        }
        owner
            .get(&link.referenced_column)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| OrmError::MissingIdentity(link.table.clone()))
    }

    /// The qualifier column and value, checked against the relation kind.
    fn scope<'a>(&'a self, qualifier: Option<&'a Value>) -> OrmResult<Option<(&'a Link, &'a Value)>> {
        match (self.qualifier(), qualifier) {
            (Some(link), Some(value)) => Ok(Some((link, value))),
            (None, None) => Ok(None),
            (Some(link), None) => Err(OrmError::InvalidRelation(format!(
                "'{}' links need a '{}' value",
                self.table(),
                link.column
            ))),
            (None, Some(_)) => Err(OrmError::InvalidRelation(format!(
                "'{}' links take no qualifier",
                self.table()
            ))),
        }
    }

    fn pivot_record(
        &self,
        owner: &Row,
        target: Option<&Value>,
        qualifier: Option<&Value>,
    ) -> OrmResult<Record> {
        let Some(target_link) = self.target() else {
            return Err(OrmError::InvalidRelation(format!(
                "'{}' is a dependent table, not a pivot table",
                self.table()
            )));
        };
        let mut record = Record::new();
        record.insert(self.owner().column.clone(), self.owner_key(owner)?);
        if let Some(value) = target {
            record.insert(target_link.column.clone(), value.clone());
        }
        if let Some((link, value)) = self.scope(qualifier)? {
            record.insert(link.column.clone(), value.clone());
        }
        Ok(record)
    }
}

fn only_one<'a>(
    mut candidates: impl Iterator<Item = &'a ForeignKey>,
    none: impl FnOnce() -> String,
    many: impl FnOnce() -> String,
) -> OrmResult<Link> {
    match (candidates.next(), candidates.next()) {
        (Some(fk), None) => Ok(Link::from(fk)),
        (None, _) => Err(OrmError::InvalidRelation(none())),
        (Some(_), Some(_)) => Err(OrmError::InvalidRelation(many())),
    }
}
