//! Response cache for slow-changing upstream reads.
//!
//! Tags, inboxes, teammates and accounts are read far more often than they
//! change, so unparameterized reads of them are kept for a fixed TTL. There
//! is no invalidation path: writes do not evict, and readers may see data up
//! to one TTL old.

mod config;
mod in_memory;
mod noop;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use in_memory::InMemoryCache;
pub use noop::NoOpCache;

use crate::error::Result;
use crate::traits::cache::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Logical identity of a cacheable resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Tags,
    Tag(String),
    Inboxes,
    Teammates,
    Teammate(String),
    Accounts,
    Account(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tags => f.write_str("tags"),
            Self::Tag(id) => write!(f, "tag:{}", id),
            Self::Inboxes => f.write_str("inboxes"),
            Self::Teammates => f.write_str("teammates"),
            Self::Teammate(id) => write!(f, "teammate:{}", id),
            Self::Accounts => f.write_str("accounts"),
            Self::Account(id) => write!(f, "account:{}", id),
        }
    }
}

/// Typed access to a [`Cache`] backend with a default TTL
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn Cache>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Build the cache described by `config`
    ///
    /// A disabled cache is backed by [`NoOpCache`] so every read is a miss.
    pub fn from_config(config: &CacheConfig) -> Self {
        let backend: Arc<dyn Cache> = if config.enabled {
            Arc::new(InMemoryCache::new(config.max_entries))
        } else {
            Arc::new(NoOpCache)
        };
        Self::new(backend, config.ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend(&self) -> &Arc<dyn Cache> {
        &self.backend
    }

    /// Look up a live entry and decode it
    ///
    /// An entry that no longer decodes as `T` is dropped and treated as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = key.to_string();
        let value = self.backend.get(&key).await?;

        match T::deserialize(value.as_ref()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Discarding undecodable cache entry");
                self.backend.invalidate(&key).await;
                None
            }
        }
    }

    /// Store `value` for `ttl`
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(encoded) => self.backend.set(&key.to_string(), encoded, ttl).await,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Skipping cache write for unencodable value");
            }
        }
    }

    /// Check the cache, fetch on a miss, and store the fetched value
    ///
    /// Fetch errors are returned as-is and leave the cache untouched.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get::<T>(&key).await {
            tracing::debug!(cache_key = %key, "Cache hit");
            return Ok(hit);
        }

        tracing::debug!(cache_key = %key, "Cache miss");
        let value = fetch().await?;
        self.set(&key, &value, self.ttl).await;
        Ok(value)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
