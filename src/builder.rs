//! Builder API for creating hybrid cache instances.

use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HybridCacheConfig;
use crate::entry::EntryOptions;
use crate::hybrid::HybridCache;
use crate::store::DistributedStore;

/// Builder for `HybridCache`.
///
/// Starts from `HybridCacheConfig::default()` (or a loaded config) and
/// overrides individual settings.
///
/// # Example
///
/// ```ignore
/// use hybrid_cache::{HybridCacheBuilder, MemoryDistributedStore};
/// use std::sync::Arc;
///
/// let cache = HybridCacheBuilder::<Forecast>::new()
///     .distributed(Arc::new(MemoryDistributedStore::default()))
///     .namespace("weather")
///     .local_capacity(1_000)
///     .build();
/// ```
pub struct HybridCacheBuilder<V> {
    config: HybridCacheConfig,
    distributed: Option<Arc<dyn DistributedStore>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> HybridCacheBuilder<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Create a builder with default settings and no distributed tier.
    pub fn new() -> Self {
        Self::from_config(HybridCacheConfig::default())
    }

    /// Create a builder from an existing configuration.
    pub fn from_config(config: HybridCacheConfig) -> Self {
        HybridCacheBuilder {
            config,
            distributed: None,
            _value: PhantomData,
        }
    }

    /// Set the distributed tier.
    pub fn distributed(mut self, store: Arc<dyn DistributedStore>) -> Self {
        self.distributed = Some(store);
        self
    }

    /// Prefix every distributed key with `namespace`.
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.config.namespace = Some(namespace.to_string());
        self
    }

    /// Bound the number of entries in the local tier.
    pub fn local_capacity(mut self, max_capacity: u64) -> Self {
        self.config.local_max_capacity = max_capacity;
        self
    }

    /// Entry options for calls that do not pass their own.
    pub fn default_entry_options(mut self, options: EntryOptions) -> Self {
        self.config.default_entry_options = options;
        self
    }

    /// How long a distributed lookup or write may take.
    pub fn distributed_timeout(mut self, timeout: Duration) -> Self {
        self.config.distributed_timeout = timeout;
        self
    }

    /// Largest encoded value written to the distributed tier.
    pub fn max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.config.max_payload_bytes = max_payload_bytes;
        self
    }

    /// Longest key that is still cached.
    pub fn max_key_length(mut self, max_key_length: usize) -> Self {
        self.config.max_key_length = max_key_length;
        self
    }

    /// Build the cache.
    pub fn build(self) -> HybridCache<V> {
        HybridCache::new(self.config, self.distributed)
    }
}

impl<V> Default for HybridCacheBuilder<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
