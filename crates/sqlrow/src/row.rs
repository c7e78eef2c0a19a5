//! Single-row lifecycle: load, alter, validate, persist, wipe.
//!
//! A [`Row`] keeps three layers of data:
//!
//! - `load`: the snapshot read from (or last written to) storage;
//! - `fresh`: the data it was created with, used to identify it before a load;
//! - `alterations`: pending changes made through [`Row::alter`].
//!
//! Reads merge them in that order, so a seed value overrides the stored one
//! and an alteration overrides both. Whatever differs from the snapshot is
//! written by the next [`Row::persist`].
//!
//! Updates are keyed by the identity of the loaded snapshot, never by the
//! altered data, so changing a key-like column still targets the original row.

use std::fmt;
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{ExecError, OrmError, OrmResult};
use crate::hook::{HookAction, RowHook};
use crate::query::{Delete, Insert, Select, Update};
use crate::schema::SchemaCatalog;
use crate::validation::ValidationErrors;
use crate::value::{Record, Value};


/// Where a row stands relative to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Never loaded.
    New,
    Loaded,
    /// The identity lookup matched nothing; the row persists as new.
    NotFound,
    /// The identity lookup matched several rows; the row refuses to persist.
    Ambiguous(usize),
    /// Deleted by `wipe()`.
    Wiped,
}

/// Result of [`Row::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    NotFound,
    Ambiguous(usize),
}

pub struct Row {
    catalog: Arc<SchemaCatalog>,
    table: String,
    fresh: Record,
    load: Option<Record>,
    alterations: Record,
    state: LoadState,
    hooks: Vec<Arc<dyn RowHook>>,
    last_error: Option<ExecError>,
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("table", &self.table)
            .field("fresh", &self.fresh)
            .field("load", &self.load)
            .field("alterations", &self.alterations)
            .field("state", &self.state)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Row {
    /// A new row seeded with `fresh`.
    ///
    /// Columns unknown to the table are dropped, as is a NULL auto-increment
    /// key (the engine assigns it).
    pub fn new(catalog: Arc<SchemaCatalog>, table: &str, fresh: Record) -> OrmResult<Self> {
        let mut fresh = catalog.filter_known(table, &fresh)?;
        let schema = catalog.table(table)?;
        fresh.retain(|column, value| {
            !(value.is_null() && schema.column(column).is_some_and(|c| c.auto_increment))
        });
        Ok(Self {
            catalog,
            table: table.to_string(),
            fresh,
            load: None,
            alterations: Record::new(),
            state: LoadState::New,
            hooks: Vec::new(),
            last_error: None,
        })
    }

    /// A row whose stored state is already known, e.g. from a fetched record.
    pub fn from_loaded(catalog: Arc<SchemaCatalog>, table: &str, record: Record) -> OrmResult<Self> {
        let loaded = catalog.filter_known(table, &record)?;
        let mut row = Self::new(catalog, table, Record::new())?;
        row.load = Some(loaded);
        row.state = LoadState::Loaded;
        Ok(row)
    }

    pub fn with_hook(mut self, hook: Arc<dyn RowHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn add_hook(&mut self, hook: Arc<dyn RowHook>) {
        self.hooks.push(hook);
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// No stored snapshot: never loaded, not found, or wiped.
    pub fn is_new(&self) -> bool {
        self.load.is_none()
    }

    /// Whether the merged view differs from the stored snapshot (or, for a
    /// new row, whether anything was altered).
    pub fn is_altered(&self) -> bool {
        !self.pending().is_empty()
    }

    pub fn alterations(&self) -> &Record {
        &self.alterations
    }

    pub fn loaded(&self) -> Option<&Record> {
        self.load.as_ref()
    }

    /// Engine error of the last failed statement issued by this row.
    pub fn last_error(&self) -> Option<&ExecError> {
        self.last_error.as_ref()
    }

    /// Value of `column` before alterations: seed value, else stored value.
    fn underlying(&self, column: &str) -> Option<&Value> {
        self.fresh
            .get(column)
            .or_else(|| self.load.as_ref().and_then(|load| load.get(column)))
    }

    /// Current value of `column`: alteration, else seed value, else stored value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.alterations
            .get(column)
            .or_else(|| self.underlying(column))
    }

    /// The merged view: stored data, then seed data, then alterations.
    pub fn export(&self) -> Record {
        let mut out = self.load.clone().unwrap_or_default();
        for layer in [&self.fresh, &self.alterations] {
            out.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out
    }

    /// Columns of the merged view that differ from the stored snapshot.
    /// Auto-increment keys are never rewritten.
    fn pending(&self) -> Record {
        let Some(load) = &self.load else {
            return self.alterations.clone();
        };
        let Ok(schema) = self.catalog.table(&self.table) else {
            return Record::new();
        };
        self.export()
            .into_iter()
            .filter(|(column, value)| {
                !load.get(column).is_some_and(|v| v.same_as(value))
                    && !schema.column(column).is_some_and(|c| c.auto_increment)
            })
            .collect()
    }

    /// Stage changes. Returns how many columns changed.
    ///
    /// Unknown and auto-incremented columns are skipped. An empty string
    /// becomes NULL for a nullable column and the column default otherwise;
    /// when the engine computes that default the column is left out so the
    /// engine fills it. A value equal to the current unaltered one cancels
    /// any pending alteration.
    pub fn alter(&mut self, data: Record) -> OrmResult<usize> {
        let catalog = Arc::clone(&self.catalog);
        let schema = catalog.table(&self.table)?;
        let mut changed = 0;
        for (column, value) in data {
            let Some(attribute) = schema.column(&column) else {
                continue;
            };
            if attribute.auto_increment {
                continue;
            }
            let value = if value.is_empty_text() {
                if attribute.nullable {
                    Value::Null
                } else if attribute.default_generated {
                    self.alterations.remove(&column);
                    continue;
                } else {
                    attribute.default_value()
                }
            } else {
                value
            };

            let unchanged = self
                .underlying(&column)
                .is_some_and(|current| current.same_as(&value));
            if unchanged {
                self.alterations.remove(&column);
            } else {
                self.alterations.insert(column, value);
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Look the row up by its primary key, or a unique key when the primary
    /// key is incomplete.
    ///
    /// Pending alterations that match the loaded values are dropped.
    pub async fn load(&mut self, conn: &impl Connection) -> OrmResult<LoadOutcome> {
        let identity = self
            .catalog
            .match_uniqueness(&self.table, &self.export())?
            .ok_or_else(|| OrmError::MissingIdentity(self.table.clone()))?;

        let mut select = Select::new(self.table.as_str())
            .where_matching(&identity)
            .limit(2);
        let result = select.fetch_all(conn).await;
        self.last_error = select.last_error().cloned();
        let mut rows = result?;

        let outcome = match rows.len() {
            0 => {
                self.load = None;
                self.state = LoadState::NotFound;
                LoadOutcome::NotFound
            }
            1 => {
                let record = rows.remove(0);
                let loaded = self.catalog.filter_known(&self.table, &record)?;
                self.load = Some(loaded);
                let redundant: Vec<String> = self
                    .alterations
                    .iter()
                    .filter(|(column, value)| {
                        self.underlying(column).is_some_and(|v| v.same_as(value))
                    })
                    .map(|(column, _)| column.clone())
                    .collect();
                for column in redundant {
                    self.alterations.remove(&column);
                }
                self.state = LoadState::Loaded;
                LoadOutcome::Loaded
            }
            n => {
                self.load = None;
                self.state = LoadState::Ambiguous(n);
                LoadOutcome::Ambiguous(n)
            }
        };
        tracing::debug!(target: "sqlrow.row", table = %self.table, outcome = ?outcome, "load");
        Ok(outcome)
    }

    /// Check every column of the table against the merged data.
    pub fn validate(&self) -> OrmResult<ValidationErrors> {
        let columns = self.catalog.columns(&self.table)?;
        let mut errors = ValidationErrors::default();
        let data = self.export();
        for column in columns {
            let value = data.get(&column.name).unwrap_or(&Value::Null);
            if let Err(err) = column.check(value) {
                errors.push(err);
            }
        }
        Ok(errors)
    }

    /// Write the row: INSERT when new, UPDATE of the pending alterations
    /// otherwise.
    ///
    /// Validation failures are returned as data and nothing is written. A row
    /// whose last load was ambiguous fails with `AmbiguousLoad`.
    pub async fn persist(&mut self, conn: &impl Connection) -> OrmResult<ValidationErrors> {
        if let LoadState::Ambiguous(matched) = self.state {
            return Err(OrmError::AmbiguousLoad {
                table: self.table.clone(),
                matched,
            });
        }
        if !self.is_new() && !self.is_altered() {
            return Ok(ValidationErrors::default());
        }

        let hooks = self.hooks.clone();
        for hook in &hooks {
            if let HookAction::Abort(reason) = hook.before_persist(self) {
                return Err(OrmError::HookAborted(reason));
            }
        }

        let errors = self.validate()?;
        if !errors.is_empty() {
            return Ok(errors);
        }

        if self.is_new() {
            self.create(conn).await?;
        } else {
            self.update(conn).await?;
        }

        for hook in &hooks {
            hook.after_persist(self);
        }
        Ok(ValidationErrors::default())
    }

    async fn create(&mut self, conn: &impl Connection) -> OrmResult<()> {
        let data = self.export();
        tracing::debug!(target: "sqlrow.row", table = %self.table, columns = data.len(), "create");

        let mut insert = Insert::new(&self.catalog, &self.table, &data)?;
        let result = insert.run(conn).await;
        self.last_error = insert.last_error().cloned();
        result?;

        if let (Some(key), Some(id)) = (
            self.catalog.auto_incremented_primary_key(&self.table)?,
            insert.last_insert_id(),
        ) {
            let id = i64::try_from(id).map_or(Value::UInt(id), Value::Int);
            self.alterations.insert(key.to_string(), id);
        }
        self.load = Some(self.export());
        self.alterations.clear();
        self.fresh.clear();
        self.state = LoadState::Loaded;
        Ok(())
    }

    async fn update(&mut self, conn: &impl Connection) -> OrmResult<()> {
        let loaded = self.load.clone().unwrap_or_default();
        let identity = self
            .catalog
            .match_uniqueness(&self.table, &loaded)?
            .ok_or_else(|| OrmError::MissingIdentity(self.table.clone()))?;
        let mut changes = self.pending();
        tracing::debug!(
            target: "sqlrow.row",
            table = %self.table,
            columns = changes.len(),
            "update"
        );

        let mut update = Update::new(&self.catalog, &self.table, &changes, &identity)?;
        let result = update.run(conn).await;
        self.last_error = update.last_error().cloned();
        result?;

        let mut merged = loaded;
        merged.append(&mut changes);
        self.load = Some(merged);
        self.alterations.clear();
        self.fresh.clear();
        Ok(())
    }

    /// Delete the row by primary key.
    ///
    /// The key comes from the stored snapshot, or from the seed data and
    /// alterations when the row was never loaded. Returns `false` when no key
    /// can be derived, a hook vetoes, the statement fails or nothing was
    /// deleted; the engine error, if any, is kept in [`Row::last_error`].
    pub async fn wipe(&mut self, conn: &impl Connection) -> bool {
        let source = self.load.clone().unwrap_or_else(|| self.export());
        let identity = match self.catalog.match_primary_keys(&self.table, &source) {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::warn!(target: "sqlrow.row", table = %self.table, "wipe without primary key values");
                return false;
            }
            Err(err) => {
                tracing::warn!(target: "sqlrow.row", table = %self.table, error = %err, "wipe failed");
                return false;
            }
        };

        let hooks = self.hooks.clone();
        for hook in &hooks {
            if let HookAction::Abort(reason) = hook.before_wipe(self) {
                tracing::warn!(target: "sqlrow.row", table = %self.table, reason = %reason, "wipe aborted by hook");
                return false;
            }
        }

        let mut delete = match Delete::new(&self.catalog, &self.table, &identity) {
            Ok(delete) => delete,
            Err(err) => {
                tracing::warn!(target: "sqlrow.row", table = %self.table, error = %err, "wipe failed");
                return false;
            }
        };
        let result = delete.run(conn).await;
        self.last_error = delete.last_error().cloned();
        match result {
            Ok(0) => false,
            Ok(_) => {
                self.load = None;
                self.alterations.clear();
                self.state = LoadState::Wiped;
                for hook in &hooks {
                    hook.after_wipe(self);
                }
                true
            }
            Err(err) => {
                tracing::warn!(target: "sqlrow.row", table = %self.table, error = %err, "wipe failed");
                false
            }
        }
    }
}
