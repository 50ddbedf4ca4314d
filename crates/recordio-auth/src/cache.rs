//! Concurrency-safe key-value cache behind a narrow interface.
//!
//! Callers only insert and read; eviction is the implementation's
//! business. Writers never mutate existing entries in place, so an
//! idempotent overwrite is always safe.

use dashmap::DashMap;

/// Narrow cache contract consumed by the gateway and legal resolver
pub trait Cache<V: Clone>: Send + Sync {
    /// Look up a cached value
    fn get(&self, key: &str) -> Option<V>;

    /// Insert or overwrite a value
    fn put(&self, key: String, value: V);

    /// Drop a single entry
    fn remove(&self, key: &str);
}

/// In-process cache over a concurrent hash map. Entries live until
/// overwritten or removed; there is no TTL at this layer.
pub struct MemoryCache<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Cache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: String, value: V) {
        self.entries.insert(key, value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}
