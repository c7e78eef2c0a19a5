//! On-disk schema cache keyed by a schema fingerprint.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::SchemaCatalog;
use super::introspect::schema_fingerprint;
use crate::connection::Connection;
use crate::error::{OrmError, OrmResult};

const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct SchemaCacheConfig {
    /// Directory to store cache files (default: `./.sqlrow`).
    pub cache_dir: PathBuf,
    /// Cache file name inside `cache_dir` (default: `schema.json`).
    pub cache_file_name: String,
    /// Database (schema) whose tables are introspected.
    pub database: String,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        let cache_dir = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".sqlrow");

        Self {
            cache_dir,
            cache_file_name: "schema.json".to_string(),
            database: String::new(),
        }
    }
}

impl SchemaCacheConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `SQLROW_CACHE_DIR` and `SQLROW_DATABASE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("SQLROW_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(database) = std::env::var("SQLROW_DATABASE") {
            config.database = database;
        }
        config
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn cache_file_name(mut self, name: impl Into<String>) -> Self {
        self.cache_file_name = name.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCacheLoad {
    /// Loaded from local cache (fingerprint unchanged).
    CacheHit,
    /// Loaded from database (cache missing/invalid or fingerprint changed).
    Refreshed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCache {
    pub version: u32,
    pub retrieved_at: DateTime<Utc>,
    pub database: String,
    pub fingerprint: String,
    pub catalog: SchemaCatalog,
}

impl SchemaCache {
    pub fn cache_path(config: &SchemaCacheConfig) -> PathBuf {
        config.cache_dir.join(&config.cache_file_name)
    }

    pub async fn load_or_refresh<C: Connection>(
        conn: &C,
        config: &SchemaCacheConfig,
    ) -> OrmResult<(Self, SchemaCacheLoad)> {
        if config.database.is_empty() {
            return Err(OrmError::SchemaLoadFailure(
                "no database configured for schema cache".into(),
            ));
        }
        let cache_path = Self::cache_path(config);
        let current_fp = schema_fingerprint(conn, &config.database).await?;

        match read_cache_file(&cache_path) {
            Ok(cached)
                if cached.version == CACHE_VERSION
                    && cached.database == config.database
                    && cached.fingerprint == current_fp =>
            {
                tracing::debug!(target: "sqlrow.schema", path = %cache_path.display(), "schema cache hit");
                return Ok((cached, SchemaCacheLoad::CacheHit));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(target: "sqlrow.schema", error = %e, "schema cache unusable");
            }
        }

        let catalog = SchemaCatalog::load(conn, &config.database).await?;
        let refreshed = SchemaCache {
            version: CACHE_VERSION,
            retrieved_at: Utc::now(),
            database: config.database.clone(),
            fingerprint: current_fp,
            catalog,
        };

        write_cache_file(&cache_path, &refreshed)?;
        tracing::debug!(target: "sqlrow.schema", path = %cache_path.display(), "schema cache refreshed");
        Ok((refreshed, SchemaCacheLoad::Refreshed))
    }
}

fn read_cache_file(path: &Path) -> OrmResult<SchemaCache> {
    let data = std::fs::read(path)?;
    serde_json::from_slice::<SchemaCache>(&data)
        .map_err(|e| OrmError::Serialization(format!("Failed to parse schema cache: {e}")))
}

fn write_cache_file(path: &Path, cache: &SchemaCache) -> OrmResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(cache)
        .map_err(|e| OrmError::Serialization(format!("Failed to serialize schema cache: {e}")))?;

    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
