//! Process-local backend backed by [`DashMap`].
//!
//! Rows live as long as the backend value does; disconnecting keeps them,
//! like closing a connection to a real database.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::Backend;
use crate::entry::RawEntry;
use crate::error::{StoreError, StoreResult};

/// In-memory backend for tests and ephemeral stores.
#[derive(Debug)]
pub struct MemoryBackend {
    table: String,
    rows: DashMap<String, String>,
    connected: AtomicBool,
}

impl MemoryBackend {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: DashMap::new(),
            connected: AtomicBool::new(false),
        }
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotConnected {
                name: self.table.clone(),
            })
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn dialect(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> StoreResult<()> {
        self.connected.store(true, Ordering::Release);
        debug!(table = %self.table, "memory backend connected");
        Ok(())
    }

    async fn disconnect(&self) -> StoreResult<()> {
        self.connected.store(false, Ordering::Release);
        debug!(table = %self.table, "memory backend disconnected");
        Ok(())
    }

    async fn raw_get(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_connected()?;
        // Suspend like any I/O-bound backend would.
        tokio::task::yield_now().await;
        Ok(self.rows.get(key).map(|row| row.value().clone()))
    }

    async fn raw_upsert(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        self.ensure_connected()?;
        tokio::task::yield_now().await;
        Ok(self.rows.insert(key.to_owned(), value.to_owned()))
    }

    async fn raw_delete(&self, key: &str) -> StoreResult<u64> {
        self.ensure_connected()?;
        tokio::task::yield_now().await;
        Ok(u64::from(self.rows.remove(key).is_some()))
    }

    async fn raw_list_all(&self) -> StoreResult<Vec<RawEntry>> {
        self.ensure_connected()?;
        tokio::task::yield_now().await;
        let mut entries: Vec<RawEntry> = self
            .rows
            .iter()
            .map(|row| RawEntry::new(row.key().clone(), row.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn raw_truncate(&self) -> StoreResult<u64> {
        self.ensure_connected()?;
        tokio::task::yield_now().await;
        let mut deleted = 0;
        self.rows.retain(|_, _| {
            deleted += 1;
            false
        });
        Ok(deleted)
    }
}
