//! Persistence backends.
//!
//! Every backend stores one collection (table) of `key → serialized value`
//! rows and implements [`Backend`]. The store core holds backends as
//! `Arc<dyn Backend>` and never inspects which engine is underneath.
//!
//! | Dialect                          | Type              | Engine                 |
//! |----------------------------------|-------------------|------------------------|
//! | `sqlite` / `better-sqlite`       | [`SqliteBackend`] | rusqlite (blocking pool) |
//! | `postgres` / `mysql` / `mariadb` | `SqlBackend`      | sqlx `Any` pool (feature `sql`) |
//! | `memory`                         | [`MemoryBackend`] | process-local map      |

use async_trait::async_trait;

use crate::entry::RawEntry;
use crate::error::StoreResult;

pub mod memory;
#[cfg(feature = "sql")]
pub mod sql;
pub mod sqlite;

pub use memory::MemoryBackend;
#[cfg(feature = "sql")]
pub use sql::{SqlBackend, SqlConnectOptions, SqlFlavor};
pub use sqlite::SqliteBackend;

/// The raw key-value contract every persistence engine satisfies.
///
/// Values cross this boundary already serialized. Calls made before a
/// successful [`Backend::connect`] fail with
/// [`StoreError::NotConnected`](crate::StoreError::NotConnected).
#[async_trait]
pub trait Backend: Send + Sync {
    /// Dialect tag, e.g. `"sqlite"` or `"postgres"`.
    fn dialect(&self) -> &str;

    /// Open the connection and make sure the table exists. Idempotent.
    async fn connect(&self) -> StoreResult<()>;

    /// Release the connection.
    async fn disconnect(&self) -> StoreResult<()>;

    /// Serialized value stored under `key`.
    async fn raw_get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Insert or update `key`, returning the serialized value it replaced.
    async fn raw_upsert(&self, key: &str, value: &str) -> StoreResult<Option<String>>;

    /// Delete `key`, returning the number of removed rows (0 or 1).
    async fn raw_delete(&self, key: &str) -> StoreResult<u64>;

    /// Every row in the collection.
    async fn raw_list_all(&self) -> StoreResult<Vec<RawEntry>>;

    /// Delete every row, returning how many were removed.
    async fn raw_truncate(&self) -> StoreResult<u64>;
}
