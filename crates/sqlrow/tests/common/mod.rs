#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use sqlrow::schema::METADATA_SQL;
use sqlrow::{Bindings, Connection, EngineError, ExecOutcome, Record, Value, record};

pub enum Reply {
    Rows(Vec<Record>),
    Exec(ExecOutcome),
    Fail(EngineError),
}

/// Serves the metadata query from a fixed schema and replays queued replies
/// for everything else.
#[derive(Default)]
pub struct FakeDb {
    metadata: Vec<Record>,
    replies: Mutex<VecDeque<Reply>>,
    log: Mutex<Vec<(String, Bindings)>>,
}

impl FakeDb {
    pub fn with_schema(metadata: Vec<Record>) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn last(&self) -> (String, Bindings) {
        self.log.lock().unwrap().last().cloned().expect("no statement issued")
    }

    fn log(&self, sql: &str, bindings: &Bindings) {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), bindings.clone()));
    }
}

impl Connection for FakeDb {
    async fn query(&self, sql: &str, bindings: &Bindings) -> Result<Vec<Record>, EngineError> {
        if sql == METADATA_SQL {
            return Ok(self.metadata.clone());
        }
        self.log(sql, bindings);
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Exec(_)) | None => Ok(Vec::new()),
        }
    }

    async fn execute(&self, sql: &str, bindings: &Bindings) -> Result<ExecOutcome, EngineError> {
        self.log(sql, bindings);
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Exec(outcome)) => Ok(outcome),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Rows(_)) | None => Ok(ExecOutcome::affected(1)),
        }
    }
}

/// One metadata row without key usage.
pub fn column(table: &str, ordinal: i64, name: &str, column_type: &str, nullable: bool) -> Record {
    record! {
        "table_name" => table,
        "column_name" => name,
        "ordinal_position" => ordinal,
        "column_default" => Value::Null,
        "is_nullable" => if nullable { "YES" } else { "NO" },
        "column_type" => column_type,
        "extra" => "",
    }
}

pub fn primary(mut row: Record, auto_increment: bool) -> Record {
    row.insert("constraint_name".into(), Value::from("PRIMARY"));
    if auto_increment {
        row.insert("extra".into(), Value::from("auto_increment"));
    }
    row
}

pub fn unique(mut row: Record, name: &str) -> Record {
    row.insert("constraint_name".into(), Value::from(name));
    row
}

pub fn foreign(mut row: Record, table: &str, column: &str) -> Record {
    let constraint = format!(
        "{}_{}_fk",
        row["table_name"].as_str().unwrap_or_default(),
        row["column_name"].as_str().unwrap_or_default()
    );
    row.insert("constraint_name".into(), Value::from(constraint));
    row.insert("position_in_unique_constraint".into(), Value::Int(1));
    row.insert("referenced_table_name".into(), Value::from(table));
    row.insert("referenced_column_name".into(), Value::from(column));
    row.insert("delete_rule".into(), Value::from("CASCADE"));
    row.insert("update_rule".into(), Value::from("RESTRICT"));
    row
}

/// users, roles, user_roles, orders.
pub fn blog_metadata() -> Vec<Record> {
    vec![
        primary(column("users", 1, "id", "int(11)", false), true),
        unique(column("users", 2, "email", "varchar(255)", false), "email_unique"),
        column("users", 3, "name", "varchar(50)", true),
        primary(column("roles", 1, "id", "int(11)", false), true),
        column("roles", 2, "name", "varchar(30)", false),
        primary(column("user_roles", 1, "user_id", "int(11)", false), false),
        foreign(column("user_roles", 1, "user_id", "int(11)", false), "users", "id"),
        primary(column("user_roles", 2, "role_id", "int(11)", false), false),
        foreign(column("user_roles", 2, "role_id", "int(11)", false), "roles", "id"),
        primary(column("orders", 1, "id", "int(11)", false), true),
        foreign(column("orders", 2, "user_id", "int(11)", true), "users", "id"),
        column("orders", 3, "note", "text", true),
    ]
}
