//! Embedded SQLite backend.
//!
//! Each collection is one table of `("key" TEXT PRIMARY KEY, "value" TEXT)`.
//! Statements run on the blocking pool through [`Database`].

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tracing::{debug, info, instrument};

use super::Backend;
use crate::db::Database;
use crate::entry::RawEntry;
use crate::error::{StoreError, StoreResult};
use crate::ops::is_valid_literal;

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteStorage {
    /// A database file; parent directories are created on connect.
    File(PathBuf),
    /// A private in-memory database, discarded on disconnect.
    Memory,
}

impl SqliteStorage {
    /// `":memory:"` selects [`SqliteStorage::Memory`], anything else a file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.as_os_str() == ":memory:" {
            Self::Memory
        } else {
            Self::File(path)
        }
    }
}

/// SQL text for one table, built once at construction.
#[derive(Debug)]
struct Statements {
    create: String,
    select: String,
    upsert: String,
    delete: String,
    list: String,
    truncate: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            create: format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (\
                 \"key\" TEXT NOT NULL PRIMARY KEY, \"value\" TEXT NOT NULL)"
            ),
            select: format!("SELECT \"value\" FROM \"{table}\" WHERE \"key\" = ?1"),
            upsert: format!(
                "INSERT INTO \"{table}\" (\"key\", \"value\") VALUES (?1, ?2) \
                 ON CONFLICT(\"key\") DO UPDATE SET \"value\" = excluded.\"value\""
            ),
            delete: format!("DELETE FROM \"{table}\" WHERE \"key\" = ?1"),
            list: format!("SELECT \"key\", \"value\" FROM \"{table}\" ORDER BY \"key\""),
            truncate: format!("DELETE FROM \"{table}\""),
        }
    }
}

/// Key-value table inside a SQLite database.
pub struct SqliteBackend {
    table: String,
    storage: SqliteStorage,
    statements: Arc<Statements>,
    db: RwLock<Option<Database>>,
}

impl SqliteBackend {
    /// Create a backend for `table`. Nothing is opened until `connect()`.
    pub fn new(table: impl Into<String>, storage: SqliteStorage) -> StoreResult<Self> {
        let table = table.into();
        if !is_valid_literal(&table) {
            return Err(StoreError::InvalidDbName(table));
        }
        Ok(Self {
            statements: Arc::new(Statements::for_table(&table)),
            table,
            storage,
            db: RwLock::new(None),
        })
    }

    /// Where this backend keeps its data.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    fn database(&self) -> StoreResult<Database> {
        self.db
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| StoreError::NotConnected {
                name: self.table.clone(),
            })
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn dialect(&self) -> &str {
        "sqlite"
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn connect(&self) -> StoreResult<()> {
        if self.database().is_ok() {
            return Ok(());
        }

        let db = match &self.storage {
            SqliteStorage::File(path) => Database::open_async(path.clone()).await,
            SqliteStorage::Memory => Database::open_in_memory(),
        }
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        let statements = Arc::clone(&self.statements);
        db.execute(move |conn| {
            conn.execute(&statements.create, [])?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Connection(format!("creating table {}: {e}", self.table)))?;

        *self.db.write().unwrap_or_else(PoisonError::into_inner) = Some(db);
        info!(storage = ?self.storage, "sqlite backend connected");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn disconnect(&self) -> StoreResult<()> {
        let db = self.db.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(db) = db {
            db.close().await?;
            info!("sqlite backend disconnected");
        }
        Ok(())
    }

    async fn raw_get(&self, key: &str) -> StoreResult<Option<String>> {
        let db = self.database()?;
        let statements = Arc::clone(&self.statements);
        let key = key.to_owned();
        db.execute(move |conn| {
            let value: Option<String> = conn
                .prepare_cached(&statements.select)?
                .query_row(rusqlite::params![key], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn raw_upsert(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        let db = self.database()?;
        let statements = Arc::clone(&self.statements);
        let key = key.to_owned();
        let value = value.to_owned();
        db.execute_mut(move |conn| {
            let tx = conn.transaction()?;
            let previous: Option<String> = tx
                .query_row(&statements.select, rusqlite::params![key], |row| row.get(0))
                .optional()?;
            tx.execute(&statements.upsert, rusqlite::params![key, value])?;
            tx.commit()?;
            debug!(key = %key, replaced = previous.is_some(), "row upserted");
            Ok(previous)
        })
        .await
    }

    async fn raw_delete(&self, key: &str) -> StoreResult<u64> {
        let db = self.database()?;
        let statements = Arc::clone(&self.statements);
        let key = key.to_owned();
        db.execute(move |conn| {
            let deleted = conn.execute(&statements.delete, rusqlite::params![key])?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn raw_list_all(&self) -> StoreResult<Vec<RawEntry>> {
        let db = self.database()?;
        let statements = Arc::clone(&self.statements);
        db.execute(move |conn| {
            let mut stmt = conn.prepare_cached(&statements.list)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RawEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn raw_truncate(&self) -> StoreResult<u64> {
        let db = self.database()?;
        let statements = Arc::clone(&self.statements);
        db.execute(move |conn| {
            let deleted = conn.execute(&statements.truncate, [])?;
            Ok(deleted as u64)
        })
        .await
    }
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("table", &self.table)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqliteBackend {
        let backend = SqliteBackend::new("kv", SqliteStorage::Memory).unwrap();
        backend.connect().await.unwrap();
        backend
    }

    #[test]
    fn rejects_unsafe_table_names() {
        let err = SqliteBackend::new("kv; DROP TABLE x", SqliteStorage::Memory).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDbName(_)));
    }

    #[test]
    fn memory_path_is_recognized() {
        assert_eq!(SqliteStorage::from_path(":memory:"), SqliteStorage::Memory);
        assert_eq!(
            SqliteStorage::from_path("data/kv.sqlite"),
            SqliteStorage::File(PathBuf::from("data/kv.sqlite"))
        );
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let backend = setup().await;
        assert!(backend.raw_get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_inserts_then_reports_previous() {
        let backend = setup().await;

        assert_eq!(backend.raw_upsert("k", "\"old\"").await.unwrap(), None);
        let previous = backend.raw_upsert("k", "\"new\"").await.unwrap();
        assert_eq!(previous.as_deref(), Some("\"old\""));
        assert_eq!(
            backend.raw_get("k").await.unwrap().as_deref(),
            Some("\"new\"")
        );
    }

    #[tokio::test]
    async fn delete_counts_rows() {
        let backend = setup().await;
        backend.raw_upsert("k", "1").await.unwrap();

        assert_eq!(backend.raw_delete("k").await.unwrap(), 1);
        assert_eq!(backend.raw_delete("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_and_truncate() {
        let backend = setup().await;
        backend.raw_upsert("b", "2").await.unwrap();
        backend.raw_upsert("a", "1").await.unwrap();

        let rows = backend.raw_list_all().await.unwrap();
        assert_eq!(rows, vec![RawEntry::new("a", "1"), RawEntry::new("b", "2")]);

        assert_eq!(backend.raw_truncate().await.unwrap(), 2);
        assert!(backend.raw_list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_is_idempotent_and_disconnect_blocks_calls() {
        let backend = setup().await;
        backend.raw_upsert("k", "1").await.unwrap();
        backend.connect().await.unwrap();
        assert_eq!(backend.raw_get("k").await.unwrap().as_deref(), Some("1"));

        backend.disconnect().await.unwrap();
        assert!(matches!(
            backend.raw_get("k").await,
            Err(StoreError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn table_creation_failure_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.sqlite");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE other (x TEXT); CREATE INDEX kv ON other (x);")
            .unwrap();

        let backend = SqliteBackend::new("kv", SqliteStorage::File(path)).unwrap();
        let err = backend.connect().await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        assert!(matches!(
            backend.raw_get("k").await,
            Err(StoreError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn file_storage_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.sqlite");

        let backend = SqliteBackend::new("kv", SqliteStorage::File(path.clone())).unwrap();
        backend.connect().await.unwrap();
        backend.raw_upsert("k", "42").await.unwrap();
        backend.disconnect().await.unwrap();

        let reopened = SqliteBackend::new("kv", SqliteStorage::File(path)).unwrap();
        reopened.connect().await.unwrap();
        assert_eq!(reopened.raw_get("k").await.unwrap().as_deref(), Some("42"));
    }
}
