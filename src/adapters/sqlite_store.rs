//! SQLite document store.
//!
//! Each document is kept as JSON text in a single table keyed by its canonical id.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info};

use crate::domain::document::Document;
use crate::domain::error::FundbookError;
use crate::domain::fund::FundId;
use crate::ports::config_port::ConfigPort;
use crate::ports::document_store::DocumentStore;

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: r2d2::Error) -> FundbookError {
    FundbookError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> FundbookError {
    FundbookError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn doc_err(e: serde_json::Error) -> FundbookError {
    FundbookError::DatabaseQuery {
        reason: format!("stored document is not valid: {e}"),
    }
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FundbookError> {
        let db_path =
            config
                .get_string("store", "path")
                .ok_or_else(|| FundbookError::ConfigMissing {
                    section: "store".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("store", "pool_size", 4);
        let pool_size = u32::try_from(pool_size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| FundbookError::ConfigInvalid {
                section: "store".into(),
                key: "pool_size".into(),
                reason: format!("{pool_size} is not a positive pool size"),
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        let store = Self { pool };
        store.initialize_schema()?;
        info!(path = %db_path, pool_size, "sqlite store opened");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, FundbookError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FundbookError> {
        self.pool.get().map_err(db_err)
    }

    fn initialize_schema(&self) -> Result<(), FundbookError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS funds (
                    id TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );",
            )
            .map_err(query_err)?;
        debug!("sqlite schema initialized");
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn save(&self, mut document: Document) -> Result<FundId, FundbookError> {
        let id = document.ensure_id()?;
        let body = serde_json::to_string(&document).map_err(doc_err)?;

        self.conn()?
            .execute(
                "INSERT INTO funds (id, body) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET body = excluded.body",
                params![id.as_str(), body],
            )
            .map_err(query_err)?;
        debug!(%id, "saved document");
        Ok(id)
    }

    fn find_by_id(&self, id: &FundId) -> Result<Option<Document>, FundbookError> {
        let body: Option<String> = self
            .conn()?
            .query_row(
                "SELECT body FROM funds WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;

        body.map(|b| serde_json::from_str(&b).map_err(doc_err))
            .transpose()
    }

    fn find_all(&self) -> Result<Vec<Document>, FundbookError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT body FROM funds ORDER BY id")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_err)?;

        let mut documents = Vec::new();
        for row in rows {
            let body = row.map_err(query_err)?;
            documents.push(serde_json::from_str(&body).map_err(doc_err)?);
        }
        Ok(documents)
    }

    fn delete_by_id(&self, id: &FundId) -> Result<bool, FundbookError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM funds WHERE id = ?1", params![id.as_str()])
            .map_err(query_err)?;
        Ok(removed > 0)
    }

    fn delete_all(&self) -> Result<(), FundbookError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM funds", [])
            .map_err(query_err)?;
        info!(removed, "cleared sqlite store");
        Ok(())
    }
}
