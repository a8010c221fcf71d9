//! Staleness-bounded memoization for expensive read operations

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Slot<T> {
    value: T,
    refreshed_at: Instant,
}

/// Memoizes the result of an async operation for a bounded age.
///
/// A read returns the stored value while it is younger than `max_age`,
/// otherwise the supplied operation runs and its result replaces the
/// (value, timestamp) pair in one write. The operation runs outside the
/// lock, so two callers that observe an expired entry at the same moment
/// both recompute; the duplicate work is accepted and the last writer
/// wins. Entries are never evicted, only refreshed.
pub struct MaxAgeCache<T> {
    max_age: Duration,
    slot: RwLock<Option<Slot<T>>>,
}

impl<T: Clone> MaxAgeCache<T> {
    /// Create a cache with the given maximum entry age
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            slot: RwLock::new(None),
        }
    }

    /// The configured maximum entry age
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Return the cached value, recomputing it first if it is absent or
    /// older than the maximum age
    pub async fn get_with<F, Fut>(&self, recompute: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.fresh_value() {
            return value;
        }

        let value = recompute().await;
        let mut slot = self.slot.write();
        *slot = Some(Slot {
            value: value.clone(),
            refreshed_at: Instant::now(),
        });
        value
    }

    fn fresh_value(&self) -> Option<T> {
        let slot = self.slot.read();
        slot.as_ref()
            .filter(|entry| entry.refreshed_at.elapsed() <= self.max_age)
            .map(|entry| entry.value.clone())
    }
}

/// A family of [`MaxAgeCache`] instances sharing one max-age, one per key.
///
/// Used for parameterized reads (one cache per user). Instances are
/// created lazily on first access and kept for the process lifetime; the
/// key space is expected to stay small.
pub struct KeyedMaxAgeCache<T> {
    max_age: Duration,
    entries: Mutex<HashMap<String, Arc<MaxAgeCache<T>>>>,
}

impl<T: Clone> KeyedMaxAgeCache<T> {
    /// Create a keyed cache family with the given maximum entry age
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the cache instance for a key
    pub fn entry(&self, key: &str) -> Arc<MaxAgeCache<T>> {
        let mut entries = self.entries.lock();
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(MaxAgeCache::new(self.max_age)))
            .clone()
    }
}
