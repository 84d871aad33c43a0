//! In-process cache of serialized values.
//!
//! Every [`Cache`] maps a key to the *serialized* form of its value, so a
//! cache never needs to know which codec the store uses. Two
//! implementations ship with the crate:
//!
//! - [`MemoryCache`]: unbounded concurrent map (the default).
//! - [`BoundedCache`]: `moka`-backed with capacity and time-to-live.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use moka::sync::Cache as MokaCache;
use tracing::debug;

// ── contract ─────────────────────────────────────────────────────────

/// Storage for serialized values, consulted before the backend.
///
/// Implementations must be safe to share across tasks.
pub trait Cache: Send + Sync {
    /// Serialized value for `key`, if cached.
    fn get(&self, key: &str) -> Option<String>;

    /// Insert or replace the serialized value for `key`.
    fn set(&self, key: &str, serialized: String);

    /// Insert `serialized` only if `key` is not cached. Returns `true` when
    /// the value was inserted. Read fills use this so a value written
    /// concurrently through [`Cache::set`] is never replaced by an older read.
    fn set_if_absent(&self, key: &str, serialized: String) -> bool;

    /// Remove `key`, returning `1` if it was cached and `0` otherwise.
    fn delete(&self, key: &str) -> u64;

    /// Snapshot of all `(key, serialized)` pairs.
    fn entries(&self) -> Vec<(String, String)>;

    /// Remove every entry.
    fn empty(&self);

    /// Number of cached entries.
    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── cache stats ──────────────────────────────────────────────────────

/// Counters tracking cache effectiveness.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Total cache hits since creation.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total cache misses since creation.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total lookups (hits + misses).
    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Hit rate as a value between 0.0 and 1.0 (returns 0.0 if no lookups).
    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} total={} rate={:.2}%",
            self.hits(),
            self.misses(),
            self.total(),
            self.hit_rate() * 100.0,
        )
    }
}

// ── memory cache ─────────────────────────────────────────────────────

/// Unbounded cache backed by [`DashMap`]. No eviction.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: DashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, serialized: String) {
        self.inner.insert(key.to_owned(), serialized);
    }

    fn set_if_absent(&self, key: &str, serialized: String) -> bool {
        match self.inner.entry(key.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(serialized);
                true
            }
        }
    }

    fn delete(&self, key: &str) -> u64 {
        u64::from(self.inner.remove(key).is_some())
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn empty(&self) {
        self.inner.clear();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

// ── bounded cache ────────────────────────────────────────────────────

/// A bounded cache backed by `moka::sync::Cache`.
///
/// Entries are evicted once `max_capacity` is exceeded or, when set, after
/// `ttl_seconds`. An evicted entry is simply re-read from the backend.
///
/// # Example
///
/// ```ignore
/// use keyvify_store::cache::BoundedCache;
///
/// let cache = BoundedCache::builder("users")
///     .max_capacity(1000)
///     .ttl_seconds(300)
///     .build();
/// ```
#[derive(Clone)]
pub struct BoundedCache {
    name: String,
    inner: MokaCache<String, String>,
}

impl BoundedCache {
    /// Start building a new bounded cache.
    pub fn builder(name: impl Into<String>) -> BoundedCacheBuilder {
        BoundedCacheBuilder {
            name: name.into(),
            max_capacity: 10_000,
            ttl_seconds: None,
        }
    }
}

impl Cache for BoundedCache {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, serialized: String) {
        self.inner.insert(key.to_owned(), serialized);
    }

    fn set_if_absent(&self, key: &str, serialized: String) -> bool {
        self.inner
            .entry_by_ref(key)
            .or_insert_with(|| serialized)
            .is_fresh()
    }

    fn delete(&self, key: &str) -> u64 {
        u64::from(self.inner.remove(key).is_some())
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.inner
            .iter()
            .map(|(key, value)| ((*key).clone(), value))
            .collect()
    }

    fn empty(&self) {
        self.inner.invalidate_all();
        // Apply the invalidation now so `entries()` stops reporting them.
        self.inner.run_pending_tasks();
        debug!(cache = %self.name, "cache emptied");
    }
}

impl fmt::Debug for BoundedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

// ── builder ──────────────────────────────────────────────────────────

/// Builder for [`BoundedCache`].
pub struct BoundedCacheBuilder {
    name: String,
    max_capacity: u64,
    ttl_seconds: Option<u64>,
}

impl BoundedCacheBuilder {
    /// Maximum number of entries the cache will hold.
    pub fn max_capacity(mut self, cap: u64) -> Self {
        self.max_capacity = cap;
        self
    }

    /// Time-to-live in seconds for each entry.
    pub fn ttl_seconds(mut self, secs: u64) -> Self {
        self.ttl_seconds = Some(secs);
        self
    }

    /// Build the cache.
    pub fn build(self) -> BoundedCache {
        let mut builder = MokaCache::builder().max_capacity(self.max_capacity);
        if let Some(secs) = self.ttl_seconds {
            builder = builder.time_to_live(Duration::from_secs(secs));
        }
        let inner = builder.build();

        debug!(
            name = %self.name,
            max_capacity = self.max_capacity,
            ttl_seconds = ?self.ttl_seconds,
            "bounded cache created"
        );

        BoundedCache {
            name: self.name,
            inner,
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
