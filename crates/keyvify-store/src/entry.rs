//! Records exchanged between the store, its backends and its listeners.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A key and its (deserialized) value, as returned by store operations.
///
/// `value` is `None` when the key does not exist. `previous` is set only
/// when a write overwrote an existing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Value>,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            value,
            previous: None,
        }
    }

    /// Attach the value this pair replaced.
    pub fn with_previous(mut self, previous: Option<Value>) -> Self {
        self.previous = previous;
        self
    }

    /// `true` when the key held a value.
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }
}

/// A key and its serialized value as stored by a backend.
///
/// This is also the record format of export files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub key: String,
    pub value: String,
}

impl RawEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
