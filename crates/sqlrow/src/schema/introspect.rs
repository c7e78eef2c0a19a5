//! Catalog metadata query and its single-pass parser.

use std::collections::{BTreeMap, HashSet};

use super::attribute::{ColumnAttribute, RawColumn};
use super::catalog::{ForeignKey, ReferentialAction, SchemaCatalog, TableSchema, UniqueKey};
use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};
use crate::value::{Bindings, Record, Value};

/// One row per (table, column, key-usage) tuple of the target database.
pub const METADATA_SQL: &str = r#"
SELECT
  c.TABLE_NAME AS table_name,
  c.COLUMN_NAME AS column_name,
  c.ORDINAL_POSITION AS ordinal_position,
  c.COLUMN_DEFAULT AS column_default,
  c.IS_NULLABLE AS is_nullable,
  c.COLUMN_TYPE AS column_type,
  c.CHARACTER_MAXIMUM_LENGTH AS character_maximum_length,
  c.NUMERIC_PRECISION AS numeric_precision,
  c.NUMERIC_SCALE AS numeric_scale,
  c.EXTRA AS extra,
  k.CONSTRAINT_NAME AS constraint_name,
  k.POSITION_IN_UNIQUE_CONSTRAINT AS position_in_unique_constraint,
  k.REFERENCED_TABLE_NAME AS referenced_table_name,
  k.REFERENCED_COLUMN_NAME AS referenced_column_name,
  r.DELETE_RULE AS delete_rule,
  r.UPDATE_RULE AS update_rule
FROM information_schema.COLUMNS c
LEFT JOIN information_schema.KEY_COLUMN_USAGE k
  ON k.TABLE_SCHEMA = c.TABLE_SCHEMA
  AND k.TABLE_NAME = c.TABLE_NAME
  AND k.COLUMN_NAME = c.COLUMN_NAME
LEFT JOIN information_schema.REFERENTIAL_CONSTRAINTS r
  ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
  AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
  AND r.TABLE_NAME = k.TABLE_NAME
WHERE c.TABLE_SCHEMA = :database
ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#;

const FINGERPRINT_SQL: &str = r#"
SELECT
  MD5(CONCAT_WS('#',
    (SELECT GROUP_CONCAT(
        CONCAT_WS('|', TABLE_NAME, COLUMN_NAME, ORDINAL_POSITION, COLUMN_TYPE,
                  IS_NULLABLE, COALESCE(COLUMN_DEFAULT, ''), EXTRA)
        ORDER BY TABLE_NAME, ORDINAL_POSITION SEPARATOR '\n')
     FROM information_schema.COLUMNS
     WHERE TABLE_SCHEMA = :database),
    (SELECT GROUP_CONCAT(
        CONCAT_WS('|', TABLE_NAME, COLUMN_NAME, CONSTRAINT_NAME,
                  COALESCE(REFERENCED_TABLE_NAME, ''), COALESCE(REFERENCED_COLUMN_NAME, ''))
        ORDER BY TABLE_NAME, CONSTRAINT_NAME, COLUMN_NAME SEPARATOR '\n')
     FROM information_schema.KEY_COLUMN_USAGE
     WHERE TABLE_SCHEMA = :database)
  )) AS fingerprint
"#;

fn database_bindings(database: &str) -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert("database", Value::from(database));
    bindings
}

/// A hash of the target database's column and key layout.
pub async fn schema_fingerprint<C: Connection>(conn: &C, database: &str) -> OrmResult<String> {
    let rows = conn
        .query(FINGERPRINT_SQL, &database_bindings(database))
        .await?;
    rows.first()
        .and_then(|row| row.get("fingerprint"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OrmError::SchemaLoadFailure("fingerprint query returned no value".into()))
}

impl SchemaCatalog {
    /// Run the metadata query for `database` and parse the result.
    pub async fn load<C: Connection>(conn: &C, database: &str) -> OrmResult<Self> {
        let rows = conn
            .query(METADATA_SQL, &database_bindings(database))
            .await?;
        let catalog = Self::from_metadata(&rows)?;
        tracing::info!(
            target: "sqlrow.schema",
            database,
            tables = catalog.len(),
            "schema catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse metadata rows shaped like [`METADATA_SQL`]'s output.
    ///
    /// Fails with [`OrmError::SchemaLoadFailure`] on an empty or malformed
    /// result set, and with [`OrmError::UnknownColumnType`] when a column type
    /// cannot be classified.
    pub fn from_metadata(rows: &[Record]) -> OrmResult<Self> {
        if rows.is_empty() {
            return Err(OrmError::SchemaLoadFailure(
                "metadata query returned no rows".into(),
            ));
        }

        let mut building: BTreeMap<String, TableBuild> = BTreeMap::new();

        for row in rows {
            let table_name = required_text(row, "table_name")?;
            let column_name = required_text(row, "column_name")?;
            let table = building
                .entry(table_name.clone())
                .or_insert_with(|| TableBuild::new(table_name.clone()));

            if table.seen.insert(column_name.clone()) {
                let raw = RawColumn {
                    name: column_name.clone(),
                    column_type: required_text(row, "column_type")?,
                    nullable: required_text(row, "is_nullable")?.eq_ignore_ascii_case("YES"),
                    default: text(row, "column_default")?,
                    length: number(row, "character_maximum_length")?,
                    precision: number(row, "numeric_precision")?.and_then(|v| u32::try_from(v).ok()),
                    scale: number(row, "numeric_scale")?.and_then(|v| u32::try_from(v).ok()),
                    extra: text(row, "extra")?.unwrap_or_default(),
                    ordinal: number(row, "ordinal_position")?
                        .and_then(|v| u32::try_from(v).ok())
                        .unwrap_or(0),
                };
                table.columns.push(ColumnAttribute::from_raw(&table_name, raw)?);
            }

            let Some(constraint) = text(row, "constraint_name")? else {
                continue;
            };

            if let Some(referenced_table) = text(row, "referenced_table_name")? {
                if table.foreign_keys.iter().any(|fk| fk.column == column_name) {
                    continue;
                }
                let referenced_column = required_text(row, "referenced_column_name")?;
                let rule = |name: &str| -> OrmResult<ReferentialAction> {
                    Ok(text(row, name)?
                        .map_or(ReferentialAction::Restrict, |r| ReferentialAction::from_rule(&r)))
                };
                table.foreign_keys.push(ForeignKey {
                    column: column_name,
                    constraint,
                    referenced_table,
                    referenced_column,
                    on_delete: rule("delete_rule")?,
                    on_update: rule("update_rule")?,
                });
            } else if number(row, "position_in_unique_constraint")?.is_none() {
                if constraint == "PRIMARY" {
                    if !table.primary_keys.contains(&column_name) {
                        table.primary_keys.push(column_name);
                    }
                } else {
                    table.unique_rows.push((constraint, column_name));
                }
            }
        }

        let tables = building.into_values().map(TableBuild::finish).collect::<Vec<_>>();
        Ok(SchemaCatalog::from_tables(tables))
    }
}

struct TableBuild {
    name: String,
    seen: HashSet<String>,
    columns: Vec<ColumnAttribute>,
    primary_keys: Vec<String>,
    unique_rows: Vec<(String, String)>,
    foreign_keys: Vec<ForeignKey>,
}

impl TableBuild {
    fn new(name: String) -> Self {
        Self {
            name,
            seen: HashSet::new(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            unique_rows: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    fn finish(mut self) -> TableSchema {
        self.columns.sort_by_key(|c| c.ordinal);

        // A unique constraint's column set is only complete once every row is seen.
        let mut unique_keys: Vec<UniqueKey> = Vec::new();
        for (name, column) in self.unique_rows {
            match unique_keys.iter().position(|k| k.name == name) {
                Some(i) => {
                    if !unique_keys[i].columns.contains(&column) {
                        unique_keys[i].columns.push(column);
                    }
                }
                None => unique_keys.push(UniqueKey {
                    name,
                    columns: vec![column],
                }),
            }
        }

        let auto_increment = self
            .primary_keys
            .iter()
            .find(|pk| {
                self.columns
                    .iter()
                    .any(|c| c.name == **pk && c.auto_increment)
            })
            .cloned();

        let ordinal_of = |column: &str| {
            self.columns
                .iter()
                .find(|c| c.name == column)
                .map_or(u32::MAX, |c| c.ordinal)
        };
        self.foreign_keys.sort_by_key(|fk| ordinal_of(&fk.column));

        TableSchema {
            name: self.name,
            columns: self.columns,
            primary_keys: self.primary_keys,
            auto_increment,
            unique_keys,
            foreign_keys: self.foreign_keys,
        }
    }
}

fn malformed(column: &str) -> OrmError {
    OrmError::SchemaLoadFailure(format!("malformed metadata row: bad `{column}`"))
}

fn text(row: &Record, column: &str) -> OrmResult<Option<String>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(s)) => Ok(Some(s.clone())),
        Some(Value::Bytes(b)) => String::from_utf8(b.clone())
            .map(Some)
            .map_err(|_| malformed(column)),
        Some(other) => Ok(Some(other.to_string())),
    }
}

fn required_text(row: &Record, column: &str) -> OrmResult<String> {
    text(row, column)?.ok_or_else(|| malformed(column))
}

fn number(row: &Record, column: &str) -> OrmResult<Option<u64>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| malformed(column)),
    }
}
