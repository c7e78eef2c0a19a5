//! # sqlrow
//!
//! A schema-aware access layer for MySQL-family databases.
//!
//! ## Features
//!
//! - **Schema catalog**: tables, columns, keys and foreign keys read once from
//!   the engine's metadata and shared read-only
//! - **Statement grammar**: SELECT/INSERT/UPDATE/DELETE built from clauses,
//!   always with named `:label` placeholders, never with inlined values
//! - **Safe defaults**: UPDATE and DELETE refuse to run without conditions
//! - **Automatic joins**: join paths inferred from foreign keys
//! - **Row lifecycle**: load, alter, validate, persist and wipe one record
//! - **Relations**: has-one and pivot-backed many-to-many associations
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlrow::{record, AutoJoin, Row, SchemaCatalog, Select};
//!
//! let catalog = Arc::new(SchemaCatalog::load(&conn, "shop").await?);
//!
//! let mut select = Select::new("orders").where_eq("status", "new");
//! AutoJoin::new(&catalog).join(&mut select, "users", None)?;
//! let rows = select.fetch_all(&conn).await?;
//!
//! let mut user = Row::new(catalog.clone(), "users", record! { "email" => "a@b.c" })?;
//! user.load(&conn).await?;
//! user.alter(record! { "name" => "Ann" })?;
//! let errors = user.persist(&conn).await?;
//! ```

pub mod connection;
pub mod entity;
pub mod error;
pub mod grammar;
pub mod hook;
pub mod join;
pub mod query;
pub mod relation;
pub mod row;
pub mod schema;
pub mod transaction;
pub mod validation;
pub mod value;

#[cfg(test)]
mod test_support;

pub use connection::{Connection, ExecOutcome};
pub use entity::{Entity, FromValue, decode};
pub use error::{EngineError, ExecError, ExecErrorKind, OrmError, OrmResult};
pub use grammar::{
    Clause, ColumnRef, Condition, Direction, Join, JoinKind, Operand, Operator, Predicate,
    Projection,
};
pub use hook::{HookAction, RowHook, TouchTimestamps};
pub use join::AutoJoin;
pub use query::{Delete, Insert, Select, Statement, StatementKind, Update};
pub use relation::{Link, Relation};
pub use row::{LoadOutcome, LoadState, Row};
pub use schema::{
    ColumnAttribute, ForeignKey, ReferentialAction, SchemaCache, SchemaCacheConfig,
    SchemaCacheLoad, SchemaCatalog, SemanticType, TableSchema, UniqueKey,
};
pub use validation::{ValidationCode, ValidationError, ValidationErrors};
pub use value::{Bindings, Record, Value};

#[cfg(feature = "derive")]
pub use sqlrow_derive::Entity;
