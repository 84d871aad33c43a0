//! Build a [`KeyValueStore`] from a [`StoreConfig`].
//!
//! The backend is chosen by the configured dialect tag:
//!
//! ```no_run
//! # async fn demo() -> keyvify_store::StoreResult<()> {
//! use keyvify_store::{StoreConfig, create_store};
//!
//! let config = StoreConfig::new("sqlite").with_storage("data/app.sqlite");
//! let store = create_store("settings", &config)?;
//! store.connect().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::backend::sqlite::SqliteStorage;
use crate::backend::{Backend, MemoryBackend, SqliteBackend};
use crate::cache::{BoundedCache, Cache, MemoryCache};
use crate::codec::Codec;
use crate::config::{CacheConfig, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::store::KeyValueStore;

#[cfg(feature = "sql")]
use crate::backend::{SqlBackend, SqlConnectOptions, SqlFlavor};

/// Supported backend dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    MariaDb,
    Memory,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for Dialect {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "better-sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "mariadb" => Ok(Self::MariaDb),
            "memory" => Ok(Self::Memory),
            _ => Err(StoreError::InvalidDialect(s.to_owned())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overrides that cannot live in a config file.
#[derive(Default)]
pub struct StoreOptions {
    /// Use this backend instead of building one from the dialect.
    pub backend: Option<Arc<dyn Backend>>,
    /// Use this cache instead of the configured one.
    pub cache: Option<Arc<dyn Cache>>,
    pub codec: Option<Arc<dyn Codec>>,
}

/// Build a disconnected store named `name` from `config`.
pub fn create_store(name: &str, config: &StoreConfig) -> StoreResult<KeyValueStore> {
    create_store_with(name, config, StoreOptions::default())
}

/// [`create_store`] with non-serializable overrides.
pub fn create_store_with(
    name: &str,
    config: &StoreConfig,
    options: StoreOptions,
) -> StoreResult<KeyValueStore> {
    config.validate()?;
    let dialect: Dialect = config.dialect.parse()?;

    let backend = match options.backend {
        Some(backend) => backend,
        None => build_backend(name, dialect, config)?,
    };

    let mut builder = KeyValueStore::builder(name, backend);
    builder = match (options.cache, &config.cache) {
        (Some(cache), _) => builder.cache(cache),
        (None, CacheConfig::Disabled) => builder.without_cache(),
        (None, CacheConfig::Memory) => builder.cache(Arc::new(MemoryCache::new())),
        (None, CacheConfig::Bounded {
            max_capacity,
            ttl_seconds,
        }) => {
            let mut cache = BoundedCache::builder(name).max_capacity(*max_capacity);
            if let Some(ttl) = ttl_seconds {
                cache = cache.ttl_seconds(*ttl);
            }
            builder.cache(Arc::new(cache.build()))
        }
    };
    if let Some(codec) = options.codec {
        builder = builder.codec(codec);
    }

    debug!(store = name, %dialect, "store created");
    builder.build()
}

fn build_backend(name: &str, dialect: Dialect, config: &StoreConfig) -> StoreResult<Arc<dyn Backend>> {
    match dialect {
        Dialect::Memory => Ok(Arc::new(MemoryBackend::new(name))),
        Dialect::Sqlite => {
            let storage = config.storage.as_deref().ok_or_else(|| {
                StoreError::InvalidConfig("sqlite dialect requires `storage`".into())
            })?;
            Ok(Arc::new(SqliteBackend::new(
                name,
                SqliteStorage::from_path(storage),
            )?))
        }
        #[cfg(feature = "sql")]
        Dialect::Postgres | Dialect::MySql | Dialect::MariaDb => {
            let flavor = match dialect {
                Dialect::Postgres => SqlFlavor::Postgres,
                Dialect::MySql => SqlFlavor::MySql,
                _ => SqlFlavor::MariaDb,
            };
            let options = SqlConnectOptions {
                uri: config.uri.clone(),
                host: config.host.clone(),
                port: config.port,
                username: config.username.clone(),
                password: config.password.clone(),
                database: config.database.clone(),
            };
            Ok(Arc::new(SqlBackend::new(name, flavor, &options)?))
        }
        #[cfg(not(feature = "sql"))]
        Dialect::Postgres | Dialect::MySql | Dialect::MariaDb => Err(StoreError::InvalidDialect(
            format!("{dialect} requires the `sql` feature"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::JsonCodec;

    #[test]
    fn dialect_names() {
        assert_eq!("better-sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("MariaDB".parse::<Dialect>().unwrap(), Dialect::MariaDb);
        for unsupported in ["mssql", "mongodb", "oracle"] {
            assert!(matches!(
                unsupported.parse::<Dialect>(),
                Err(StoreError::InvalidDialect(_))
            ));
        }
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        let err = create_store("kv", &StoreConfig::new("mssql")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDialect(_)));
    }

    #[test]
    fn sqlite_requires_storage() {
        let err = create_store("kv", &StoreConfig::new("sqlite")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let err = create_store("no spaces", &StoreConfig::new("memory")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDbName(_)));
    }

    #[cfg(feature = "sql")]
    #[test]
    fn sql_dialects_build_without_connecting() {
        for dialect in ["postgres", "mysql", "mariadb"] {
            let store = create_store("kv", &StoreConfig::new(dialect)).unwrap();
            assert_eq!(store.dialect(), dialect);
            assert!(!store.is_connected());
        }
    }

    #[tokio::test]
    async fn in_memory_sqlite_store() {
        let config = StoreConfig::new("better-sqlite").with_storage(":memory:");
        let store = create_store("kv", &config).unwrap();
        assert_eq!(store.dialect(), "sqlite");

        store.connect().await.unwrap();
        store.set("k", json!({"n": 1})).await.unwrap();
        assert_eq!(store.get("k.n").await.unwrap().value, Some(json!(1)));
    }

    #[tokio::test]
    async fn bounded_and_disabled_caches() {
        let bounded = StoreConfig::new("memory").with_cache(CacheConfig::Bounded {
            max_capacity: 10,
            ttl_seconds: Some(60),
        });
        let store = create_store("kv", &bounded).unwrap();
        store.connect().await.unwrap();
        store.set("k", json!(1)).await.unwrap();
        assert_eq!(store.entries().len(), 1);

        let disabled = StoreConfig::new("memory").with_cache(CacheConfig::Disabled);
        let store = create_store("kv", &disabled).unwrap();
        store.connect().await.unwrap();
        store.set("k", json!(1)).await.unwrap();
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn options_override_config() {
        let backend = Arc::new(MemoryBackend::new("kv"));
        let options = StoreOptions {
            backend: Some(backend.clone()),
            cache: None,
            codec: Some(Arc::new(JsonCodec)),
        };
        // The dialect still has to be valid, but its backend is not built.
        let store = create_store_with("kv", &StoreConfig::new("sqlite").with_storage("unused"), options)
            .unwrap();
        assert_eq!(store.dialect(), "memory");

        store.connect().await.unwrap();
        store.set("k", json!(true)).await.unwrap();
        assert_eq!(backend.raw_get("k").await.unwrap().as_deref(), Some("true"));
    }
}
