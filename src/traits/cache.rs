//! Storage seam for cached upstream responses
//!
//! Values are stored as decoded JSON so any backend can hold any resource
//! type; [`crate::cache::ResponseCache`] layers typed access on top.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Key-value store with per-entry time-to-live
///
/// Implementations must never return an entry whose TTL has elapsed; an
/// expired entry is indistinguishable from a missing one.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a live entry
    async fn get(&self, key: &str) -> Option<Arc<Value>>;

    /// Store `value` under `key`, replacing any previous entry and its TTL
    async fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Drop a single entry
    async fn invalidate(&self, key: &str);

    /// Drop every entry
    async fn clear(&self);

    /// Approximate number of stored entries
    fn entry_count(&self) -> u64;
}
