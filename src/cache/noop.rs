use crate::traits::cache::Cache;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Cache that stores nothing, used when response caching is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

#[async_trait]
impl Cache for NoOpCache {
    async fn get(&self, _key: &str) -> Option<Arc<Value>> {
        None
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}

    async fn invalidate(&self, _key: &str) {}

    async fn clear(&self) {}

    fn entry_count(&self) -> u64 {
        0
    }
}
