//! Lifecycle events and the per-store listener registry.
//!
//! Listeners are plain callbacks. They run synchronously, in registration
//! order, on the task that performed the operation and before the
//! operation returns. Each operation fires exactly one event.
//!
//! # Usage
//!
//! ```rust
//! # use keyvify_store::events::{EventEmitter, EventKind, StoreEvent};
//! let emitter = EventEmitter::new();
//! let id = emitter.on(EventKind::Truncate, |event| {
//!     if let StoreEvent::Truncate { deleted } = event {
//!         println!("emptied {deleted} rows");
//!     }
//! });
//! emitter.emit(&StoreEvent::Truncate { deleted: 3 });
//! assert!(emitter.off(id));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::entry::Pair;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Discriminant of a [`StoreEvent`], used to subscribe to one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Connect,
    Disconnect,
    ValueSet,
    ValueGet,
    ValueUpdate,
    ValueDelete,
    ValueFetch,
    Truncate,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ValueSet => "valueSet",
            Self::ValueGet => "valueGet",
            Self::ValueUpdate => "valueUpdate",
            Self::ValueDelete => "valueDelete",
            Self::ValueFetch => "valueFetch",
            Self::Truncate => "truncate",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StoreEvent {
    /// The backend connection was established.
    Connect,
    /// The backend connection was released.
    Disconnect,
    /// A key that did not exist was written.
    ValueSet(Pair),
    /// A key was read (the value may be absent).
    ValueGet(Pair),
    /// An existing key was overwritten.
    ValueUpdate { old: Pair, new: Pair },
    /// A key was deleted; `deleted` is 0 or 1.
    ValueDelete { key: String, deleted: u64 },
    /// Every entry was listed from the backend.
    ValueFetch(Vec<Pair>),
    /// The collection was emptied.
    Truncate { deleted: u64 },
}

impl StoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect => EventKind::Connect,
            Self::Disconnect => EventKind::Disconnect,
            Self::ValueSet(_) => EventKind::ValueSet,
            Self::ValueGet(_) => EventKind::ValueGet,
            Self::ValueUpdate { .. } => EventKind::ValueUpdate,
            Self::ValueDelete { .. } => EventKind::ValueDelete,
            Self::ValueFetch(_) => EventKind::ValueFetch,
            Self::Truncate { .. } => EventKind::Truncate,
        }
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

struct Registration {
    id: ListenerId,
    /// `None` subscribes to every kind.
    kind: Option<EventKind>,
    listener: Listener,
}

/// Registry of listeners owned by a single store.
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    registrations: RwLock<Vec<Registration>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one kind of event.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(listener))
    }

    /// Subscribe to every event.
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(listener))
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Number of listeners that would receive an event of `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| r.kind.is_none_or(|k| k == kind))
            .count()
    }

    /// Deliver `event` to every matching listener, in registration order.
    ///
    /// The registry lock is released before listeners run, so a listener
    /// may itself register or remove listeners.
    pub fn emit(&self, event: &StoreEvent) {
        let kind = event.kind();
        let matching: Vec<Listener> = self
            .registrations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| r.kind.is_none_or(|k| k == kind))
            .map(|r| Arc::clone(&r.listener))
            .collect();

        for listener in matching {
            listener(event);
        }
    }

    fn register(&self, kind: Option<EventKind>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Registration { id, kind, listener });
        id
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .registrations
            .read()
            .map(|r| r.len())
            .unwrap_or_default();
        f.debug_struct("EventEmitter")
            .field("listeners", &count)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
