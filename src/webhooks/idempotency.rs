use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Deduplication identity of a delivery: `(type, payload.id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub event_type: String,
    pub id: String,
}

impl DedupKey {
    pub fn new(event_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            id: id.into(),
        }
    }
}

/// Record of webhook deliveries that have already been accepted
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically check and record `key`
    ///
    /// Returns `true` if the caller now owns the delivery, `false` if it was
    /// already claimed inside the window.
    async fn claim(&self, key: &DedupKey) -> bool;

    /// Whether `key` is currently recorded
    async fn is_processed(&self, key: &DedupKey) -> bool;

    /// Drop records older than the window
    async fn cleanup_old_entries(&self);
}

/// In-memory store with a sliding dedup window
///
/// A key is remembered for `window` after it was claimed; once evicted the
/// same delivery is accepted again.
pub struct MemoryIdempotencyStore {
    processed: Mutex<HashMap<DedupKey, Instant>>,
    window: Duration,
}

impl MemoryIdempotencyStore {
    pub fn new(window: Duration) -> Self {
        Self {
            processed: Mutex::new(HashMap::new()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn len(&self) -> usize {
        self.processed.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_expired(&self, processed: &mut HashMap<DedupKey, Instant>, now: Instant) {
        processed.retain(|_, claimed_at| now.duration_since(*claimed_at) < self.window);
    }
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn claim(&self, key: &DedupKey) -> bool {
        let now = Instant::now();
        let mut processed = self.processed.lock().await;
        self.evict_expired(&mut processed, now);

        if processed.contains_key(key) {
            return false;
        }
        processed.insert(key.clone(), now);
        true
    }

    async fn is_processed(&self, key: &DedupKey) -> bool {
        let processed = self.processed.lock().await;
        processed
            .get(key)
            .is_some_and(|claimed_at| claimed_at.elapsed() < self.window)
    }

    async fn cleanup_old_entries(&self) {
        let mut processed = self.processed.lock().await;
        let before = processed.len();
        self.evict_expired(&mut processed, Instant::now());

        let evicted = before - processed.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired webhook dedup records");
        }
    }
}
