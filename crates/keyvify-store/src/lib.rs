//! # keyvify-store
//!
//! One key-value interface over SQLite, PostgreSQL, MySQL/MariaDB and an
//! in-process map.
//!
//! Values are `serde_json::Value`s addressed by a literal key, optionally
//! followed by a dot-path into the value (`"user.profile.name"`). Reads go
//! through a cache of serialized values, writes go through to the backend
//! and then refresh the cache, and every operation emits one event.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  KeyValueStore  (address parsing, events)    │
//! ├──────────────────────────────────────────────┤
//! │  ops      dot-paths, push/pull, math         │
//! │  Codec    Value <-> stored string            │
//! │  Cache    MemoryCache / BoundedCache (moka)  │
//! ├──────────────────────────────────────────────┤
//! │  Backend  sqlite · sql (sqlx Any) · memory   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! # async fn demo() -> keyvify_store::StoreResult<()> {
//! use keyvify_store::{StoreConfig, create_store};
//! use serde_json::json;
//!
//! let store = create_store("profiles", &StoreConfig::new("sqlite").with_storage("data/kv.sqlite"))?;
//! store.connect().await?;
//!
//! store.set("ada.name", json!("Ada")).await?;
//! store.push("ada.tags", json!("math")).await?;
//! store.add("ada.visits", 1.0).await?;
//!
//! let name = store.get("ada.name").await?;
//! assert_eq!(name.value, Some(json!("Ada")));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod db;
pub mod entry;
pub mod error;
pub mod events;
pub mod factory;
pub mod ops;
pub mod store;
pub mod transfer;

// ── re-exports ───────────────────────────────────────────────────────

pub use backend::{Backend, MemoryBackend, SqliteBackend, sqlite::SqliteStorage};
#[cfg(feature = "sql")]
pub use backend::{SqlBackend, SqlConnectOptions, SqlFlavor};
pub use cache::{BoundedCache, BoundedCacheBuilder, Cache, CacheStats, MemoryCache};
pub use codec::{Codec, FnCodec, JsonCodec};
pub use config::{CacheConfig, StoreConfig};
pub use db::Database;
pub use entry::{Pair, RawEntry};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use events::{EventEmitter, EventKind, ListenerId, StoreEvent};
pub use factory::{Dialect, StoreOptions, create_store, create_store_with};
pub use ops::{KeyAddress, MathOperator};
pub use store::{KeyValueStore, KeyValueStoreBuilder};
pub use transfer::{ImportSummary, export_all, import_all};
