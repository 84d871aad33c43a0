//! Serializable store configuration.
//!
//! ```toml
//! dialect = "sqlite"
//! storage = "data/keyvify.sqlite"
//!
//! [cache]
//! kind = "bounded"
//! max_capacity = 10000
//! ttl_seconds = 300
//! ```
//!
//! Values that cannot be written in TOML (a pre-built backend, a cache
//! instance, a codec) are passed to the factory through
//! [`StoreOptions`](crate::factory::StoreOptions).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Which cache the factory puts in front of the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheConfig {
    /// Every read goes to the backend.
    Disabled,
    /// Unbounded process-local map.
    #[default]
    Memory,
    /// Capacity-bounded cache with optional time-to-live.
    Bounded {
        max_capacity: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl_seconds: Option<u64>,
    },
}

/// Connection and cache settings for one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend tag: `sqlite`, `better-sqlite`, `postgres`, `mysql`,
    /// `mariadb` or `memory`.
    pub dialect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// SQLite database file, or `:memory:`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Full connection URI; takes precedence over host/port/credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl StoreConfig {
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            ..Self::default()
        }
    }

    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StoreError::InvalidConfig(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file. A missing file is reported as
    /// [`StoreError::NoConfig`].
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NoConfig(path.display().to_string()),
            _ => StoreError::Io(e),
        })?;
        debug!(path = %path.display(), "loaded store config");
        Self::from_toml_str(&content)
    }

    /// Check field shapes. The dialect itself is checked by the factory.
    pub fn validate(&self) -> StoreResult<()> {
        if self.dialect.trim().is_empty() {
            return Err(StoreError::InvalidConfig("dialect is empty".into()));
        }

        let text_fields = [
            ("database", &self.database),
            ("username", &self.username),
            ("host", &self.host),
            ("storage", &self.storage),
            ("uri", &self.uri),
        ];
        for (field, value) in text_fields {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(StoreError::InvalidConfig(format!("{field} is empty")));
            }
        }

        if self.port == Some(0) {
            return Err(StoreError::InvalidConfig("port must be non-zero".into()));
        }

        if let CacheConfig::Bounded {
            max_capacity,
            ttl_seconds,
        } = &self.cache
        {
            if *max_capacity == 0 {
                return Err(StoreError::InvalidConfig(
                    "cache.max_capacity must be non-zero".into(),
                ));
            }
            if *ttl_seconds == Some(0) {
                return Err(StoreError::InvalidConfig(
                    "cache.ttl_seconds must be non-zero".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let config = StoreConfig::from_toml_str(
            r#"
            dialect = "postgres"
            host = "db"
            port = 5433
            username = "app"
            database = "kv"

            [cache]
            kind = "bounded"
            max_capacity = 100
            ttl_seconds = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.dialect, "postgres");
        assert_eq!(config.port, Some(5433));
        assert_eq!(
            config.cache,
            CacheConfig::Bounded {
                max_capacity: 100,
                ttl_seconds: Some(30)
            }
        );
    }

    #[test]
    fn cache_defaults_to_memory() {
        let config = StoreConfig::from_toml_str("dialect = \"memory\"").unwrap();
        assert_eq!(config.cache, CacheConfig::Memory);
    }

    #[test]
    fn disabled_cache() {
        let config =
            StoreConfig::from_toml_str("dialect = \"memory\"\ncache = { kind = \"disabled\" }")
                .unwrap();
        assert_eq!(config.cache, CacheConfig::Disabled);
    }

    #[test]
    fn rejects_bad_shapes() {
        for doc in [
            "dialect = \"\"",
            "dialect = \"sqlite\"\nstorage = \"\"",
            "dialect = \"mysql\"\nport = 0",
            "dialect = \"mysql\"\nport = \"80\"",
            "dialect = \"memory\"\ncache = { kind = \"bounded\", max_capacity = 0 }",
            "storage = \"x\"",
        ] {
            assert!(
                matches!(
                    StoreConfig::from_toml_str(doc),
                    Err(StoreError::InvalidConfig(_))
                ),
                "{doc}"
            );
        }
    }

    #[test]
    fn load_missing_file_is_no_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StoreError::NoConfig(_)));
    }

    #[test]
    fn load_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        let config = StoreConfig::new("sqlite")
            .with_storage("kv.sqlite")
            .with_cache(CacheConfig::Disabled);
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        assert_eq!(StoreConfig::load(&path).unwrap(), config);
    }
}
