use moka::Expiry;
use moka::ops::compute::Op;
use moka::sync::Cache;
use std::time::{Duration, Instant as StdInstant};
use tokio::time::Instant;

use crate::entry::Entry;

/// Configuration for LocalStore.
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    /// Maximum number of entries the local tier can hold.
    pub max_capacity: u64,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        LocalStoreConfig {
            max_capacity: 10_000,
        }
    }
}

/// Evicts each entry once its own TTL has elapsed.
///
/// This only reclaims memory. Whether an entry may be served is decided by
/// `Entry::is_expired` on read.
struct EntryExpiry;

impl<V> Expiry<String, Entry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry<V>,
        _created_at: StdInstant,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(value.stored_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry<V>,
        _updated_at: StdInstant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_at.saturating_duration_since(value.stored_at))
    }
}

/// In-process tier: typed values with a per-entry expiration.
///
/// Backed by a Moka concurrent cache, so reads and writes never suspend and
/// never take a global lock. Concurrent writes to the same key replace the
/// entry atomically; the last write wins.
///
/// Expired entries are treated as absent and dropped on access, unless a
/// fresh write has already replaced them.
pub struct LocalStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<String, Entry<V>>,
}

impl<V> LocalStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new LocalStore with the given configuration.
    pub fn new(config: LocalStoreConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        LocalStore { cache }
    }

    /// Return the value if it is present and not yet expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.cache.get(key)?;

        if entry.is_expired(Instant::now()) {
            // Only drop the entry we saw; a concurrent insert may have replaced it
            self.cache
                .entry(key.to_string())
                .and_compute_with(|current| match current {
                    Some(current) if current.value().same_write(&entry) => Op::Remove,
                    _ => Op::Nop,
                });
            return None;
        }

        Some(entry.value)
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: &str, value: V, ttl: Duration) {
        self.cache.insert(key.to_string(), Entry::new(value, ttl));
    }

    /// Remove the key from the local tier.
    pub fn remove(&self, key: &str) {
        self.cache.invalidate(key);
    }

    /// Approximate number of entries (for monitoring/debugging).
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl<V> Default for LocalStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(LocalStoreConfig::default())
    }
}
