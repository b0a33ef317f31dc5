//! In-memory key-value store shared by the HTTP servers.
//!
//! Entries carry a TTL and are dropped lazily on read. Closing the store
//! releases every entry; later calls fail with [`StoreError::Closed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

use crate::lifecycle::{Deadline, UnitResult};

/// Name of the termination hook that releases the store.
pub const STORE_HOOK_NAME: &str = "kv-store";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store is closed")]
    Closed,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct KvStore {
    entries: DashMap<String, Entry>,
    closed: AtomicBool,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_open()?;
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => return Ok(Some(entry.value.clone())),
            Some(_) => {}
        }
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        Ok(None)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.entries.insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    /// Release every entry. Returns how many were dropped.
    pub fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let released = self.entries.len();
        self.entries.clear();
        released
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Termination hook body.
    pub async fn release(&self, deadline: Deadline) -> UnitResult {
        let released = self.close();
        tracing::info!(released, remaining = ?deadline.remaining(), "Key-value store closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = KvStore::new();
        store.set("test", "v1", Duration::from_secs(60)).unwrap();
        assert_eq!(store.get("test").unwrap().as_deref(), Some("v1"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.get("test").unwrap(), None);
        assert!(store.entries.is_empty());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_access() {
        let store = KvStore::new();
        store.set("a", "1", Duration::from_secs(60)).unwrap();
        store.set("b", "2", Duration::from_secs(60)).unwrap();

        assert_eq!(store.close(), 2);
        assert_eq!(store.close(), 0);
        assert_eq!(store.get("a"), Err(StoreError::Closed));
        assert_eq!(store.set("c", "3", Duration::from_secs(1)), Err(StoreError::Closed));
    }

    #[tokio::test]
    async fn test_release_closes() {
        let store = KvStore::new();
        store.release(Deadline::after(Duration::from_secs(1))).await.unwrap();
        assert!(store.is_closed());
    }
}
