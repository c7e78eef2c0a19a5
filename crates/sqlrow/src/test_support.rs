//! Test doubles: a scripted connection and a metadata-row builder.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::connection::{Connection, ExecOutcome};
use crate::error::EngineError;
use crate::schema::SchemaCatalog;
use crate::value::{Bindings, Record, Value};

enum Scripted {
    Rows(Vec<Record>),
    Exec(ExecOutcome),
    Fail(EngineError),
}

/// Records every statement and replays queued responses in order.
///
/// With nothing queued, queries return no rows and executions report one
/// affected row. Transaction calls are logged as `BEGIN`/`COMMIT`/`ROLLBACK`
/// and never consume a queued response.
#[derive(Default)]
pub(crate) struct MockConnection {
    calls: Mutex<Vec<(String, Bindings)>>,
    script: Mutex<VecDeque<Scripted>>,
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_rows(&self, rows: Vec<Record>) {
        self.script.lock().unwrap().push_back(Scripted::Rows(rows));
    }

    pub(crate) fn push_exec(&self, outcome: ExecOutcome) {
        self.script.lock().unwrap().push_back(Scripted::Exec(outcome));
    }

    pub(crate) fn push_error(&self, err: EngineError) {
        self.script.lock().unwrap().push_back(Scripted::Fail(err));
    }

    pub(crate) fn calls(&self) -> Vec<(String, Bindings)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.calls().into_iter().map(|(sql, _)| sql).collect()
    }

    pub(crate) fn last_call(&self) -> Option<(String, Bindings)> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn record(&self, sql: &str, bindings: &Bindings) {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), bindings.clone()));
    }

    fn next(&self) -> Option<Scripted> {
        self.script.lock().unwrap().pop_front()
    }
}

impl Connection for MockConnection {
    async fn query(&self, sql: &str, bindings: &Bindings) -> Result<Vec<Record>, EngineError> {
        self.record(sql, bindings);
        match self.next() {
            Some(Scripted::Rows(rows)) => Ok(rows),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Exec(_)) | None => Ok(Vec::new()),
        }
    }

    async fn execute(&self, sql: &str, bindings: &Bindings) -> Result<ExecOutcome, EngineError> {
        self.record(sql, bindings);
        match self.next() {
            Some(Scripted::Exec(outcome)) => Ok(outcome),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Rows(_)) | None => Ok(ExecOutcome::affected(1)),
        }
    }

    async fn begin(&self) -> Result<(), EngineError> {
        self.record("BEGIN", &Bindings::new());
        Ok(())
    }

    async fn commit(&self) -> Result<(), EngineError> {
        self.record("COMMIT", &Bindings::new());
        Ok(())
    }

    async fn rollback(&self) -> Result<(), EngineError> {
        self.record("ROLLBACK", &Bindings::new());
        Ok(())
    }
}

enum KeySpec {
    Primary,
    Unique(String),
    Foreign { table: String, column: String },
}

/// One column's metadata, rendered into one row per key usage.
pub(crate) struct ColumnSpec {
    table: String,
    name: String,
    column_type: String,
    nullable: bool,
    default: Option<String>,
    extra: String,
    keys: Vec<KeySpec>,
}

pub(crate) fn col(table: &str, name: &str, column_type: &str) -> ColumnSpec {
    ColumnSpec {
        table: table.into(),
        name: name.into(),
        column_type: column_type.into(),
        nullable: false,
        default: None,
        extra: String::new(),
        keys: Vec::new(),
    }
}

impl ColumnSpec {
    pub(crate) fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub(crate) fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.into());
        self
    }

    pub(crate) fn auto_increment(mut self) -> Self {
        self.extra = "auto_increment".into();
        self
    }

    pub(crate) fn primary(mut self) -> Self {
        self.keys.push(KeySpec::Primary);
        self
    }

    pub(crate) fn unique(mut self, name: &str) -> Self {
        self.keys.push(KeySpec::Unique(name.into()));
        self
    }

    pub(crate) fn references(mut self, table: &str, column: &str) -> Self {
        self.keys.push(KeySpec::Foreign {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    fn length(&self) -> Option<u64> {
        let lowered = self.column_type.to_ascii_lowercase();
        if lowered.contains("text") {
            return Some(65_535);
        }
        if !(lowered.starts_with("varchar") || lowered.starts_with("char")) {
            return None;
        }
        let inner = lowered.split_once('(')?.1.split_once(')')?.0;
        inner.parse().ok()
    }

    fn precision_scale(&self) -> (Option<u64>, Option<u64>) {
        let lowered = self.column_type.to_ascii_lowercase();
        if !lowered.starts_with("decimal") {
            return (None, None);
        }
        let inner = lowered
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .map(|(inner, _)| inner.to_string())
            .unwrap_or_default();
        let mut parts = inner.split(',').map(|p| p.trim().parse::<u64>().ok());
        (parts.next().flatten(), parts.next().flatten())
    }

    fn rows(&self, ordinal: u32) -> Vec<Record> {
        let (precision, scale) = self.precision_scale();
        let base = crate::record! {
            "table_name" => self.table.as_str(),
            "column_name" => self.name.as_str(),
            "ordinal_position" => ordinal,
            "column_default" => self.default.clone(),
            "is_nullable" => if self.nullable { "YES" } else { "NO" },
            "column_type" => self.column_type.as_str(),
            "character_maximum_length" => self.length(),
            "numeric_precision" => precision,
            "numeric_scale" => scale,
            "extra" => self.extra.as_str(),
        };

        if self.keys.is_empty() {
            return vec![base];
        }

        self.keys
            .iter()
            .map(|key| {
                let mut row = base.clone();
                match key {
                    KeySpec::Primary => {
                        row.insert("constraint_name".into(), Value::from("PRIMARY"));
                    }
                    KeySpec::Unique(name) => {
                        row.insert("constraint_name".into(), Value::from(name.as_str()));
                    }
                    KeySpec::Foreign { table, column } => {
                        let name = format!("{}_{}_fk", self.table, self.name);
                        row.insert("constraint_name".into(), Value::from(name));
                        row.insert("position_in_unique_constraint".into(), Value::Int(1));
                        row.insert("referenced_table_name".into(), Value::from(table.as_str()));
                        row.insert("referenced_column_name".into(), Value::from(column.as_str()));
                        row.insert("delete_rule".into(), Value::from("CASCADE"));
                        row.insert("update_rule".into(), Value::from("RESTRICT"));
                    }
                }
                row
            })
            .collect()
    }
}

#[derive(Default)]
pub(crate) struct MetaBuilder {
    ordinals: BTreeMap<String, u32>,
    rows: Vec<Record>,
}

impl MetaBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(mut self, spec: ColumnSpec) -> Self {
        let ordinal = self.ordinals.entry(spec.table.clone()).or_insert(0);
        *ordinal += 1;
        self.rows.extend(spec.rows(*ordinal));
        self
    }

    pub(crate) fn rows(self) -> Vec<Record> {
        self.rows
    }

    pub(crate) fn build(self) -> SchemaCatalog {
        SchemaCatalog::from_metadata(&self.rows).unwrap()
    }
}

/// users, orders, roles, user_roles, profiles, projects, assignments.
pub(crate) fn shop_metadata() -> Vec<Record> {
    MetaBuilder::new()
        .add(col("users", "id", "int(11)").primary().auto_increment())
        .add(col("users", "email", "varchar(255)").unique("email_unique"))
        .add(col("users", "name", "varchar(50)").nullable())
        .add(col("users", "active", "tinyint(1)").default_value("1"))
        .add(col("orders", "id", "int(11)").primary().auto_increment())
        .add(col("orders", "user_id", "int(11)").references("users", "id"))
        .add(col("orders", "status", "enum('new','shipped','cancelled')").default_value("new"))
        .add(col("orders", "total", "decimal(10,2)").default_value("0.00"))
        .add(col("orders", "created_at", "datetime").nullable())
        .add(col("roles", "id", "int(11)").primary().auto_increment())
        .add(col("roles", "name", "varchar(30)").unique("role_name_unique"))
        .add(col("user_roles", "user_id", "int(11)").primary().references("users", "id"))
        .add(col("user_roles", "role_id", "int(11)").primary().references("roles", "id"))
        .add(col("profiles", "id", "int(11)").primary().auto_increment())
        .add(col("profiles", "user_id", "int(11)").references("users", "id"))
        .add(col("profiles", "bio", "text").nullable())
        .add(col("projects", "id", "int(11)").primary().auto_increment())
        .add(col("projects", "name", "varchar(50)"))
        .add(col("assignments", "user_id", "int(11)").primary().references("users", "id"))
        .add(col("assignments", "project_id", "int(11)").primary().references("projects", "id"))
        .add(col("assignments", "role_id", "int(11)").primary().references("roles", "id"))
        .rows()
}

pub(crate) fn shop_catalog() -> SchemaCatalog {
    SchemaCatalog::from_metadata(&shop_metadata()).unwrap()
}

pub(crate) fn shop() -> Arc<SchemaCatalog> {
    Arc::new(shop_catalog())
}
