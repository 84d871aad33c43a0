//! The key-value store core.
//!
//! [`KeyValueStore`] ties a [`Backend`], an optional [`Cache`], a [`Codec`]
//! and an [`EventEmitter`] together. Every keyed operation runs the same
//! cycle:
//!
//! ```text
//! parse address ─▶ cache ──miss──▶ backend.raw_get ─▶ fill cache
//!                    │hit
//!                    ▼
//!             apply operator (ops)
//!                    ▼
//!  backend.raw_upsert ─▶ cache.set ─▶ emit event ─▶ Pair
//! ```
//!
//! There is no per-key locking. Two concurrent read-modify-write calls on
//! the same key may lose one update; the key still ends in one of the
//! values either call would have written.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::backend::Backend;
use crate::cache::{Cache, CacheStats, MemoryCache};
use crate::codec::{Codec, JsonCodec};
use crate::entry::Pair;
use crate::error::{StoreError, StoreResult};
use crate::events::{EventEmitter, EventKind, ListenerId, StoreEvent};
use crate::ops::{
    KeyAddress, MathOperator, apply_math, get_at_path, is_valid_literal, number_value,
    pull_from_array, push_to_array, set_at_path,
};

// ═══════════════════════════════════════════════════════════════════════
//  Builder
// ═══════════════════════════════════════════════════════════════════════

/// Assembles a [`KeyValueStore`]. Caching defaults to a [`MemoryCache`] and
/// the codec to [`JsonCodec`].
pub struct KeyValueStoreBuilder {
    name: String,
    backend: Arc<dyn Backend>,
    cache: Option<Arc<dyn Cache>>,
    codec: Arc<dyn Codec>,
}

impl KeyValueStoreBuilder {
    /// Use `cache` instead of the default unbounded map.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Read and write straight through to the backend.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Validate the collection name and build the store (disconnected).
    pub fn build(self) -> StoreResult<KeyValueStore> {
        if !is_valid_literal(&self.name) {
            return Err(StoreError::InvalidDbName(self.name));
        }
        Ok(KeyValueStore {
            name: self.name,
            backend: self.backend,
            cache: self.cache,
            codec: self.codec,
            events: EventEmitter::new(),
            connected: AtomicBool::new(false),
            stats: CacheStats::default(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  KeyValueStore
// ═══════════════════════════════════════════════════════════════════════

/// A named collection of structured values behind a uniform interface.
///
/// Share it across tasks with `Arc<KeyValueStore>`.
pub struct KeyValueStore {
    name: String,
    backend: Arc<dyn Backend>,
    cache: Option<Arc<dyn Cache>>,
    codec: Arc<dyn Codec>,
    events: EventEmitter,
    connected: AtomicBool,
    stats: CacheStats,
}

impl KeyValueStore {
    pub fn builder(name: impl Into<String>, backend: Arc<dyn Backend>) -> KeyValueStoreBuilder {
        KeyValueStoreBuilder {
            name: name.into(),
            backend,
            cache: Some(Arc::new(MemoryCache::new())),
            codec: Arc::new(JsonCodec),
        }
    }

    // ── accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> &str {
        self.backend.dialect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Hit/miss counters of the read-through cache.
    pub fn cache_stats(&self) -> &CacheStats {
        &self.stats
    }

    // ── listeners ────────────────────────────────────────────────────

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.events.on_any(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    // ── lifecycle ────────────────────────────────────────────────────

    /// Connect the backend and make sure the collection exists.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn connect(&self) -> StoreResult<()> {
        self.backend.connect().await?;
        self.connected.store(true, Ordering::Release);
        info!(dialect = self.dialect(), "store connected");
        self.events.emit(&StoreEvent::Connect);
        Ok(())
    }

    /// Release the backend connection. The cache is emptied so a later
    /// reconnect cannot serve rows the backend no longer has.
    ///
    /// If the backend fails to disconnect, the error is returned and the
    /// store stays connected with its cache intact.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn disconnect(&self) -> StoreResult<()> {
        self.backend.disconnect().await?;
        self.connected.store(false, Ordering::Release);
        if let Some(cache) = &self.cache {
            cache.empty();
        }
        info!("store disconnected");
        self.events.emit(&StoreEvent::Disconnect);
        Ok(())
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Read a key, or a location inside its value.
    ///
    /// An absent key (or absent path) yields a [`Pair`] without a value. A
    /// stored `null` has no locations inside it, so a dot-path into it is
    /// absent too.
    #[instrument(skip(self, address), fields(store = %self.name))]
    pub async fn get(&self, address: impl Into<KeyAddress>) -> StoreResult<Pair> {
        let address = address.into();
        let (base, path) = self.resolve(&address)?;

        let root = self.fetch(&base).await?;
        let value = match (root, path) {
            (root, None) => root,
            (None | Some(Value::Null), Some(_)) => None,
            (Some(root), Some(path)) => {
                if !(root.is_object() || root.is_array()) {
                    return Err(StoreError::ValueNotObject { key: base });
                }
                get_at_path(&root, &path).cloned()
            }
        };

        let pair = Pair::new(address.to_string(), value);
        self.events.emit(&StoreEvent::ValueGet(pair.clone()));
        Ok(pair)
    }

    /// Every stored entry, read from the backend. The cache is rebuilt
    /// from the result.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn all(&self) -> StoreResult<Vec<Pair>> {
        self.ensure_connected()?;
        let rows = self.backend.raw_list_all().await?;

        let pairs = rows
            .iter()
            .map(|row| -> StoreResult<Pair> {
                let value = self.codec.deserialize(&row.value)?;
                Ok(Pair::new(row.key.clone(), Some(value)))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        if let Some(cache) = &self.cache {
            cache.empty();
            for row in rows {
                cache.set(&row.key, row.value);
            }
        }

        debug!(count = pairs.len(), "fetched all entries");
        self.events.emit(&StoreEvent::ValueFetch(pairs.clone()));
        Ok(pairs)
    }

    /// Cached entries only, sorted by key. Empty when caching is disabled.
    pub fn entries(&self) -> Vec<Pair> {
        let Some(cache) = &self.cache else {
            return Vec::new();
        };
        let mut pairs: Vec<Pair> = cache
            .entries()
            .into_iter()
            .filter_map(|(key, raw)| match self.codec.deserialize(&raw) {
                Ok(value) => Some(Pair::new(key, Some(value))),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping undecodable cache entry");
                    None
                }
            })
            .collect();
        pairs.sort_by(|a, b| a.key.cmp(&b.key));
        pairs
    }

    // ── writes ───────────────────────────────────────────────────────

    /// Write `value` at a key, or at a location inside its (mapping) value.
    #[instrument(skip(self, address, value), fields(store = %self.name))]
    pub async fn set(&self, address: impl Into<KeyAddress>, value: Value) -> StoreResult<Pair> {
        let address = address.into();
        let (base, path) = self.resolve(&address)?;

        let root = match path {
            None => value,
            Some(path) => {
                let current = self.fetch_mapping(&base).await?;
                set_at_path(current, &path, value)
            }
        };
        self.write(base, root).await
    }

    /// Append `item` to the array at the address (absent counts as `[]`).
    #[instrument(skip(self, address, item), fields(store = %self.name))]
    pub async fn push(&self, address: impl Into<KeyAddress>, item: Value) -> StoreResult<Pair> {
        self.update(address.into(), move |current| Ok(push_to_array(current, item)))
            .await
    }

    /// Remove every element equal to `item` from the array at the address.
    #[instrument(skip(self, address, item), fields(store = %self.name))]
    pub async fn pull(&self, address: impl Into<KeyAddress>, item: Value) -> StoreResult<Pair> {
        self.update(address.into(), move |current| {
            Ok(pull_from_array(current, &item))
        })
        .await
    }

    /// Combine the number at the address (absent counts as `0`) with
    /// `number` using `operator`, e.g. `"+"`, `"mod"` or `"power"`.
    ///
    /// The arithmetic is IEEE-754, but JSON has no infinity or NaN: a result
    /// such as `x / 0` fails with [`StoreError::InvalidNumber`] and nothing
    /// is written.
    pub async fn math(
        &self,
        address: impl Into<KeyAddress>,
        operator: &str,
        number: f64,
    ) -> StoreResult<Pair> {
        let operator: MathOperator = operator.parse().map_err(|_| {
            StoreError::InvalidParameters(format!("unknown math operator {operator:?}"))
        })?;
        self.apply(address.into(), operator, number).await
    }

    pub async fn add(&self, address: impl Into<KeyAddress>, number: f64) -> StoreResult<Pair> {
        self.apply(address.into(), MathOperator::Add, number).await
    }

    pub async fn subtract(&self, address: impl Into<KeyAddress>, number: f64) -> StoreResult<Pair> {
        self.apply(address.into(), MathOperator::Subtract, number)
            .await
    }

    pub async fn multiply(&self, address: impl Into<KeyAddress>, number: f64) -> StoreResult<Pair> {
        self.apply(address.into(), MathOperator::Multiply, number)
            .await
    }

    /// Divide the number at the address by `number`. Division by zero
    /// yields a non-finite result, which is rejected with
    /// [`StoreError::InvalidNumber`] as in [`KeyValueStore::math`].
    pub async fn divide(&self, address: impl Into<KeyAddress>, number: f64) -> StoreResult<Pair> {
        self.apply(address.into(), MathOperator::Divide, number).await
    }

    pub async fn modulo(&self, address: impl Into<KeyAddress>, number: f64) -> StoreResult<Pair> {
        self.apply(address.into(), MathOperator::Modulo, number).await
    }

    pub async fn exponent(&self, address: impl Into<KeyAddress>, number: f64) -> StoreResult<Pair> {
        self.apply(address.into(), MathOperator::Exponent, number)
            .await
    }

    /// Delete a plain key. Returns the number of removed entries (0 or 1).
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn delete(&self, key: &str) -> StoreResult<u64> {
        self.ensure_connected()?;
        if key.is_empty() {
            return Err(StoreError::NoKey);
        }
        if !is_valid_literal(key) {
            return Err(StoreError::InvalidKey {
                key: key.to_owned(),
            });
        }

        let deleted = self.backend.raw_delete(key).await?;
        if let Some(cache) = &self.cache {
            cache.delete(key);
        }

        debug!(key = %key, deleted, "key deleted");
        self.events.emit(&StoreEvent::ValueDelete {
            key: key.to_owned(),
            deleted,
        });
        Ok(deleted)
    }

    /// Delete every entry in the collection.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn truncate(&self) -> StoreResult<u64> {
        self.ensure_connected()?;
        let result = self.backend.raw_truncate().await;
        if let Some(cache) = &self.cache {
            cache.empty();
        }
        let deleted = result?;

        info!(deleted, "collection truncated");
        self.events.emit(&StoreEvent::Truncate { deleted });
        Ok(deleted)
    }

    // ── internals ────────────────────────────────────────────────────

    fn ensure_connected(&self) -> StoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::NotConnected {
                name: self.name.clone(),
            })
        }
    }

    fn resolve(&self, address: &KeyAddress) -> StoreResult<(String, Option<String>)> {
        self.ensure_connected()?;
        address.resolve()
    }

    /// Current value of `key`: cache first, backend on a miss.
    async fn fetch(&self, key: &str) -> StoreResult<Option<Value>> {
        if let Some(cache) = &self.cache {
            if let Some(raw) = cache.get(key) {
                match self.codec.deserialize(&raw) {
                    Ok(value) => {
                        self.stats.record_hit();
                        debug!(key = %key, "cache hit");
                        return Ok(Some(value));
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "dropping undecodable cache entry");
                        cache.delete(key);
                    }
                }
            }
            self.stats.record_miss();
            debug!(key = %key, "cache miss");
        }

        let Some(raw) = self.backend.raw_get(key).await? else {
            return Ok(None);
        };
        let value = self.codec.deserialize(&raw)?;
        if let Some(cache) = &self.cache {
            // A write that landed while this read was in flight wins.
            cache.set_if_absent(key, raw);
        }
        Ok(Some(value))
    }

    /// Current value of `key` as a mapping root for dot-path writes.
    async fn fetch_mapping(&self, key: &str) -> StoreResult<Value> {
        match self.fetch(key).await? {
            None | Some(Value::Null) => Ok(Value::Object(Map::new())),
            Some(root @ Value::Object(_)) => Ok(root),
            Some(_) => Err(StoreError::ValueNotObject {
                key: key.to_owned(),
            }),
        }
    }

    /// Read-modify-write of the value at `address`.
    async fn update<F>(&self, address: KeyAddress, transform: F) -> StoreResult<Pair>
    where
        F: FnOnce(Option<Value>) -> StoreResult<Value> + Send,
    {
        let (base, path) = self.resolve(&address)?;

        let root = match path {
            None => {
                let current = self.fetch(&base).await?;
                transform(current)?
            }
            Some(path) => {
                let root = self.fetch_mapping(&base).await?;
                let current = get_at_path(&root, &path).cloned();
                let updated = transform(current)?;
                set_at_path(root, &path, updated)
            }
        };
        self.write(base, root).await
    }

    async fn apply(&self, address: KeyAddress, operator: MathOperator, number: f64) -> StoreResult<Pair> {
        let operand = number_value(number).ok_or_else(|| {
            StoreError::InvalidParameters(format!("{number} is not a finite number"))
        })?;
        debug!(%address, %operator, number, "applying math");
        self.update(address, move |current| {
            let current = match current {
                None | Some(Value::Null) => Value::from(0),
                Some(value) => value,
            };
            apply_math(&current, &operand, operator.symbol())
        })
        .await
    }

    /// Persist `value` under `key`, then refresh the cache and emit.
    async fn write(&self, key: String, value: Value) -> StoreResult<Pair> {
        let serialized = self.codec.serialize(&value)?;

        let previous = match self.backend.raw_upsert(&key, &serialized).await {
            Ok(previous) => previous,
            Err(e) => {
                if let Some(cache) = &self.cache {
                    cache.delete(&key);
                    warn!(key = %key, error = %e, "write failed, cache entry invalidated");
                }
                return Err(e);
            }
        };
        if let Some(cache) = &self.cache {
            cache.set(&key, serialized);
        }

        let previous = previous.map(|raw| {
            self.codec.deserialize(&raw).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "previous value is undecodable, reporting raw text");
                Value::String(raw)
            })
        });

        let pair = Pair::new(key, Some(value)).with_previous(previous);
        match &pair.previous {
            Some(old) => {
                debug!(key = %pair.key, "value updated");
                self.events.emit(&StoreEvent::ValueUpdate {
                    old: Pair::new(pair.key.clone(), Some(old.clone())),
                    new: pair.clone(),
                });
            }
            None => {
                debug!(key = %pair.key, "value set");
                self.events.emit(&StoreEvent::ValueSet(pair.clone()));
            }
        }
        Ok(pair)
    }
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("name", &self.name)
            .field("dialect", &self.dialect())
            .field("cached", &self.cache.is_some())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────
