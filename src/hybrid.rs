use serde::{Serialize, de::DeserializeOwned};
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::HybridCacheConfig;
use crate::entry::EntryOptions;
use crate::error::CacheError;
use crate::flight::SingleFlight;
use crate::store::DistributedStore;
use crate::stores::local::{LocalStore, LocalStoreConfig};
use crate::utils::build_cache_key;

/// A get-or-create cache with an in-process tier in front of a distributed tier.
///
/// Lookups go local → distributed → source. The source runs at most once per
/// key at a time, however many callers miss together, and its value is
/// written to both tiers before any of them sees it.
///
/// Distributed failures never reach the caller: a failed, slow or
/// undecodable read is a miss, and a failed write only costs a future miss.
/// The only errors `get_or_create` returns are `CacheError::Source` and
/// `CacheError::Cancelled`.
///
/// Cloning is cheap; all clones share the same tiers.
///
/// # Example
///
/// ```ignore
/// let cache: HybridCache<Forecast> = HybridCacheBuilder::new()
///     .distributed(Arc::new(RedisStore::new(config).await?))
///     .namespace("weather")
///     .build();
///
/// let options = EntryOptions::new(Duration::from_secs(5), Duration::from_secs(10));
/// let forecast = cache
///     .get_or_create("today", |_key| fetch_forecast(), Some(&options), &cancel)
///     .await?;
/// ```
pub struct HybridCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Inner<V>>,
}

struct Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    local: LocalStore<V>,
    distributed: Option<Arc<dyn DistributedStore>>,
    flight: SingleFlight<V>,
    namespace: Option<String>,
    default_options: EntryOptions,
    distributed_timeout: Duration,
    max_key_length: usize,
    max_payload_bytes: usize,
}

impl<V> Clone for HybridCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        HybridCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> HybridCache<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    /// Create a cache from a configuration and an optional distributed tier.
    ///
    /// Without a distributed store the cache runs local-only, still with
    /// single-flight protection of the source.
    pub fn new(config: HybridCacheConfig, distributed: Option<Arc<dyn DistributedStore>>) -> Self {
        let local = LocalStore::new(LocalStoreConfig {
            max_capacity: config.local_max_capacity,
        });

        HybridCache {
            inner: Arc::new(Inner {
                local,
                distributed,
                flight: SingleFlight::new(),
                namespace: config.namespace,
                default_options: config.default_entry_options,
                distributed_timeout: config.distributed_timeout,
                max_key_length: config.max_key_length,
                max_payload_bytes: config.max_payload_bytes,
            }),
        }
    }

    /// Return the cached value for `key`, or compute it with `factory`.
    ///
    /// # Arguments
    /// * `key` - The cache key; the factory receives it as well
    /// * `factory` - Produces the value on a miss at both tiers
    /// * `options` - Tier expirations and flags, `None` for the cache defaults
    /// * `cancel` - Ends this caller's wait when cancelled
    ///
    /// # Errors
    /// * `CacheError::Source` - The factory failed. Every caller that shared
    ///   the computation receives the same error and nothing is cached.
    /// * `CacheError::Cancelled` - `cancel` fired first. A computation started
    ///   on this caller's behalf keeps running for the others and still fills
    ///   the tiers.
    ///
    /// # Example
    /// ```ignore
    /// let cancel = cancel_after(&shutdown, Duration::from_secs(3));
    /// let user = cache
    ///     .get_or_create("user:123", |key| async move { db.get_user(&key).await }, None, &cancel)
    ///     .await?;
    /// ```
    pub async fn get_or_create<F, Fut, E>(
        &self,
        key: &str,
        factory: F,
        options: Option<&EntryOptions>,
        cancel: &CancellationToken,
    ) -> Result<V, CacheError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        let options = options.copied().unwrap_or(self.inner.default_options);

        if key.len() > self.inner.max_key_length {
            tracing::warn!(
                key_length = key.len(),
                max_key_length = self.inner.max_key_length,
                "key too long, computing without cache"
            );
            // Still coalesced, but neither tier is read or written
            let owned_key = key.to_string();
            return self
                .inner
                .flight
                .run(key, cancel, move || {
                    let computation = factory(owned_key);
                    async move { computation.await.map_err(CacheError::from_source) }
                })
                .await;
        }

        if !options.flags.disable_local_read {
            if let Some(value) = self.inner.local.get(key) {
                tracing::debug!(key, tier = "local", "cache hit");
                return Ok(value);
            }
        }

        if !options.flags.disable_distributed_read {
            if let Some(value) = self.inner.read_distributed(key, cancel).await? {
                if !options.flags.disable_local_write {
                    self.inner
                        .local
                        .insert(key, value.clone(), options.local_expiration);
                }
                return Ok(value);
            }
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();

        self.inner
            .flight
            .run(key, cancel, move || {
                let computation = factory(owned_key.clone());
                async move {
                    let value = computation.await.map_err(CacheError::from_source)?;
                    inner.populate(&owned_key, &value, &options).await;
                    Ok(value)
                }
            })
            .await
    }

    /// Write a value to both tiers.
    ///
    /// Unlike the writes done by `get_or_create`, a distributed failure is
    /// returned to the caller. The local tier is written either way.
    pub async fn set(
        &self,
        key: &str,
        value: V,
        options: Option<&EntryOptions>,
    ) -> Result<(), CacheError> {
        let options = options.copied().unwrap_or(self.inner.default_options);

        if key.len() > self.inner.max_key_length {
            tracing::warn!(key_length = key.len(), "key too long, not cached");
            return Ok(());
        }

        if !options.flags.disable_local_write {
            self.inner
                .local
                .insert(key, value.clone(), options.local_expiration);
        }

        if options.flags.disable_distributed_write {
            return Ok(());
        }
        let Some(store) = &self.inner.distributed else {
            return Ok(());
        };

        let payload = serde_json::to_vec(&value)
            .map_err(|e| CacheError::Serialization(format!("Serialization failed: {}", e)))?;

        store
            .set(
                &self.inner.remote_key(key),
                payload,
                options.distributed_expiration,
            )
            .await
    }

    /// Remove the key from both tiers.
    ///
    /// Only this process's local tier is cleared; other processes keep their
    /// local copies until they expire.
    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.inner.local.remove(key);

        if let Some(store) = &self.inner.distributed {
            store.remove(&self.inner.remote_key(key)).await?;
        }

        Ok(())
    }

    /// The key under which `key` is stored in the distributed tier.
    pub fn distributed_key(&self, key: &str) -> String {
        self.inner.remote_key(key)
    }

    /// Approximate number of entries in the local tier.
    pub fn local_entry_count(&self) -> u64 {
        self.inner.local.entry_count()
    }

    /// Number of keys whose source computation is currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.flight.in_flight()
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    fn remote_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(namespace) => build_cache_key(namespace, key),
            None => key.to_string(),
        }
    }

    /// Look the key up in the distributed tier.
    ///
    /// Returns `Err` only when the caller is cancelled; every tier problem is
    /// logged and reported as a miss.
    async fn read_distributed(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<V>, CacheError> {
        let Some(store) = &self.distributed else {
            return Ok(None);
        };
        let remote_key = self.remote_key(key);
        let tier = store.name();

        let lookup = tokio::time::timeout(self.distributed_timeout, store.get(&remote_key));
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CacheError::Cancelled),
            outcome = lookup => outcome,
        };

        let bytes = match outcome {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                tracing::debug!(key, tier, "cache miss");
                return Ok(None);
            }
            Ok(Err(err)) => {
                tracing::warn!(key, tier, error = %err, "distributed read failed, treating as miss");
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!(
                    key,
                    tier,
                    timeout_ms = self.distributed_timeout.as_millis() as u64,
                    "distributed read timed out, treating as miss"
                );
                return Ok(None);
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                tracing::debug!(key, tier, "cache hit");
                Ok(Some(value))
            }
            Err(err) => {
                tracing::warn!(key, tier, error = %err, "undecodable distributed entry, treating as miss");
                Ok(None)
            }
        }
    }

    /// Write a freshly computed value to the tiers the options allow.
    ///
    /// Never fails: a value that cannot be stored remotely is still returned
    /// to the callers.
    async fn populate(&self, key: &str, value: &V, options: &EntryOptions) {
        if !options.flags.disable_local_write {
            self.local
                .insert(key, value.clone(), options.local_expiration);
        }

        if options.flags.disable_distributed_write {
            return;
        }
        let Some(store) = &self.distributed else {
            return;
        };
        let tier = store.name();

        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(key, tier, error = %err, "value not serializable, skipping distributed write");
                return;
            }
        };

        if payload.len() > self.max_payload_bytes {
            tracing::warn!(
                key,
                tier,
                bytes = payload.len(),
                max_payload_bytes = self.max_payload_bytes,
                "payload too large, skipping distributed write"
            );
            return;
        }

        let remote_key = self.remote_key(key);
        let write = store.set(&remote_key, payload, options.distributed_expiration);

        match tokio::time::timeout(self.distributed_timeout, write).await {
            Ok(Ok(())) => tracing::debug!(key, tier, "cache populated"),
            Ok(Err(err)) => {
                tracing::warn!(key, tier, error = %err, "distributed write failed");
            }
            Err(_) => {
                tracing::warn!(key, tier, "distributed write timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryFlags;
    use crate::stores::memory::MemoryDistributedStore;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_with(store: &Arc<MemoryDistributedStore>, namespace: Option<&str>) -> HybridCache<String> {
        let config = HybridCacheConfig {
            namespace: namespace.map(str::to_string),
            ..Default::default()
        };
        let distributed: Arc<dyn DistributedStore> = store.clone();
        HybridCache::new(config, Some(distributed))
    }

    #[tokio::test]
    async fn test_factory_receives_key() {
        let store = Arc::new(MemoryDistributedStore::default());
        let cache = cache_with(&store, None);
        let cancel = CancellationToken::new();

        let value = cache
            .get_or_create(
                "user:1",
                |key| async move { Ok::<_, Infallible>(format!("loaded {}", key)) },
                None,
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(value, "loaded user:1");
        assert!(store.contains("user:1").await);
        assert_eq!(cache.local_entry_count(), 1);
    }

    #[tokio::test]
    async fn test_namespace_prefixes_distributed_keys() {
        let store = Arc::new(MemoryDistributedStore::default());
        let cache = cache_with(&store, Some("weather"));
        let cancel = CancellationToken::new();

        cache
            .get_or_create("today", |_| async { Ok::<_, Infallible>("sunny".to_string()) }, None, &cancel)
            .await
            .unwrap();

        assert_eq!(cache.distributed_key("today"), "weather::today");
        assert!(store.contains("weather::today").await);
        assert!(!store.contains("today").await);
    }

    #[tokio::test]
    async fn test_already_cancelled_caller_does_nothing() {
        let store = Arc::new(MemoryDistributedStore::default());
        let cache = cache_with(&store, None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let err = cache
            .get_or_create(
                "weather",
                move |_| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>("sunny".to_string())
                },
                None,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_disabled_distributed_tier() {
        let store = Arc::new(MemoryDistributedStore::default());
        let cache = cache_with(&store, None);
        let cancel = CancellationToken::new();
        let options = EntryOptions::default().with_flags(EntryFlags::distributed_disabled());

        cache
            .get_or_create("weather", |_| async { Ok::<_, Infallible>("sunny".to_string()) }, Some(&options), &cancel)
            .await
            .unwrap();

        assert_eq!(store.reads(), 0);
        assert_eq!(store.writes(), 0);
        assert_eq!(cache.local_entry_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_local_tier() {
        let store = Arc::new(MemoryDistributedStore::default());
        let cache = cache_with(&store, None);
        let cancel = CancellationToken::new();
        let options = EntryOptions::default().with_flags(EntryFlags::local_disabled());

        for _ in 0..2 {
            let value = cache
                .get_or_create("weather", |_| async { Ok::<_, Infallible>("sunny".to_string()) }, Some(&options), &cancel)
                .await
                .unwrap();
            assert_eq!(value, "sunny");
        }

        // The second call is served by the distributed tier
        assert_eq!(store.reads(), 2);
        assert_eq!(store.writes(), 1);
        assert_eq!(cache.local_entry_count(), 0);
    }

    #[tokio::test]
    async fn test_local_only_cache() {
        let cache: HybridCache<String> = HybridCache::new(HybridCacheConfig::default(), None);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = calls.clone();
            let value = cache
                .get_or_create(
                    "weather",
                    move |_| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, Infallible>("sunny".to_string())
                    },
                    None,
                    &cancel,
                )
                .await
                .unwrap();
            assert_eq!(value, "sunny");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        cache.set("other", "rain".to_string(), None).await.unwrap();
        cache.remove("other").await.unwrap();
    }

    #[tokio::test]
    async fn test_set_surfaces_distributed_errors() {
        let store = Arc::new(MemoryDistributedStore::default());
        let cache = cache_with(&store, None);
        let cancel = CancellationToken::new();

        store.fail_writes(true);
        let err = cache
            .set("weather", "sunny".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Store { .. }));

        // The local tier was still written
        let value = cache
            .get_or_create("weather", |_| async { Ok::<_, Infallible>("rain".to_string()) }, None, &cancel)
            .await
            .unwrap();
        assert_eq!(value, "sunny");
    }
}
