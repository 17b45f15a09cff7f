//! In-process cache backing used when Redis is not reachable.
//!
//! Expiry is lazy: an entry past its TTL is dropped by the read that finds
//! it. Nothing sweeps the map in the background.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::traits::{CacheStore, StorageError};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    #[inline]
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < self.ttl
    }
}

pub struct InMemoryStore {
    data: DashMap<String, CacheEntry>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Entries held, including expired ones not yet read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    /// Remaining lifetime of a live entry.
    #[must_use]
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.data
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.ttl.saturating_sub(now.duration_since(e.inserted_at)))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Instant::now();
        if let Some(entry) = self.data.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }
        // Expired: the read guard is released above, so removal can't deadlock.
        self.data.remove_if(key, |_, e| !e.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.data.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                inserted_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let now = Instant::now();
        Ok(self.data.remove(key).is_some_and(|(_, e)| e.is_live(now)))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let before = self.data.len();
        self.data.retain(|k, _| !k.starts_with(prefix));
        Ok(before - self.data.len())
    }

    async fn count_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let now = Instant::now();
        Ok(self
            .data
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().is_live(now))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();
        store.set("f1dash:session:2023:monza:R", "{\"a\":1}", HOUR).await.unwrap();

        let value = store.get("f1dash:session:2023:monza:R").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent_and_dropped_on_read() {
        let store = InMemoryStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(1)).await;
        // Still held until something reads it
        assert_eq!(store.len(), 1);
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining() {
        let store = InMemoryStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(store.ttl_remaining("k"), Some(Duration::from_secs(45)));
        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(store.ttl_remaining("k"), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_and_resets_ttl() {
        let store = InMemoryStore::new();
        store.set("k", "old", Duration::from_millis(1)).await.unwrap();
        store.set("k", "new", HOUR).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let store = InMemoryStore::new();
        assert!(!store.delete("nonexistent").await.unwrap());

        store.set("k", "v", HOUR).await.unwrap();
        assert!(store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_prefix_only_touches_matching_keys() {
        let store = InMemoryStore::new();
        store.set("f1dash:session:2023:monza:R", "1", HOUR).await.unwrap();
        store.set("f1dash:session:2023:monza:Q", "2", HOUR).await.unwrap();
        store.set("f1dash:session:2023:spa:R", "3", HOUR).await.unwrap();

        let removed = store.delete_prefix("f1dash:session:2023:monza:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get("f1dash:session:2023:spa:R").await.unwrap().is_some());
        assert_eq!(store.count_prefix("f1dash:").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let mut handles = vec![];

        for batch in 0..10 {
            let store_clone = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    let key = format!("batch-{}-item-{}", batch, i);
                    store_clone.set(&key, "x", HOUR).await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 100);
    }
}
