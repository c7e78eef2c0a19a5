//! Schema Catalog: a structured model of tables, columns and keys built from
//! the engine's metadata views.

mod attribute;
mod cache;
mod catalog;
mod introspect;

pub use attribute::{ColumnAttribute, RawColumn, SemanticType};
pub use cache::{SchemaCache, SchemaCacheConfig, SchemaCacheLoad};
pub use catalog::{ForeignKey, ReferentialAction, SchemaCatalog, TableSchema, UniqueKey};
pub use introspect::{METADATA_SQL, schema_fingerprint};
