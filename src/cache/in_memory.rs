//! In-memory response cache backed by moka
//!
//! Every entry carries its own TTL. moka evicts expired entries in the
//! background; reads additionally check the stored deadline so an entry
//! past its TTL is reported as a miss even before maintenance has run.

use crate::traits::cache::Cache;
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    value: Arc<Value>,
    ttl: Duration,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Expiry policy that reads the TTL stored on each entry
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        // Reads never extend the lifetime
        duration_until_expiry
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Bounded concurrent cache for upstream API responses
#[derive(Clone)]
pub struct InMemoryCache {
    inner: MokaCache<String, CacheEntry>,
}

impl InMemoryCache {
    /// Create a cache holding at most `max_entries` entries
    pub fn new(max_entries: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry)
            .build();

        Self { inner }
    }

    /// Force pending evictions to run
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Arc<Value>> {
        let entry = self.inner.get(key).await?;

        if entry.is_expired(Instant::now()) {
            self.inner.invalidate(key).await;
            return None;
        }

        Some(entry.value)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value: Arc::new(value),
            ttl,
            expires_at: Instant::now() + ttl,
        };
        self.inner.insert(key.to_string(), entry).await;
    }

    async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_within_ttl() {
        let cache = InMemoryCache::new(100);
        cache.set("k", json!({"v": 1}), Duration::from_millis(1000)).await;

        let value = cache.get("k").await.expect("entry should be live");
        assert_eq!(*value, json!({"v": 1}));
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = InMemoryCache::new(100);
        cache.set("k", json!("v"), Duration::from_millis(1000)).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_absent_key_is_a_miss() {
        let cache = InMemoryCache::new(100);
        assert!(cache.get("tags").await.is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites_value_and_ttl() {
        let cache = InMemoryCache::new(100);
        cache.set("k", json!(1), Duration::from_millis(50)).await;
        cache.set("k", json!(2), Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("k").await.as_deref(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = InMemoryCache::new(100);
        let ttl = Duration::from_secs(60);
        cache.set("a", json!("a"), ttl).await;
        cache.set("b", json!("b"), ttl).await;

        cache.invalidate("a").await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());

        cache.clear().await;
        assert!(cache.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_bounded_cache_does_not_grow_unbounded() {
        let cache = InMemoryCache::new(10);

        for i in 0..100 {
            cache
                .set(&format!("teammate:{}", i), json!(i), Duration::from_secs(60))
                .await;
        }
        cache.run_pending_tasks().await;

        let size = cache.entry_count();
        // moka may briefly overshoot while eviction catches up
        assert!(size <= 15, "cache should stay near capacity, got {}", size);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        let cache = Arc::new(InMemoryCache::new(1000));
        let mut handles = vec![];

        for i in 0..10 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    let key = format!("tag:{}_{}", i, j);
                    cache.set(&key, json!(j), Duration::from_secs(60)).await;
                    assert!(cache.get(&key).await.is_some());
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
