use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

/// A distributed store is the shared, network-reachable tier behind the local cache.
///
/// Stores deal in opaque bytes; encoding values is the caller's job. Every
/// operation may fail with a transient error, which must be distinguishable
/// from a miss (`Ok(None)`).
///
/// The store implementation is responsible for expiring data on its own.
#[async_trait]
pub trait DistributedStore: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "memory"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Return the stored bytes.
    ///
    /// The response must be `None` for misses and for expired entries.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store the bytes for the given key, replacing any previous value.
    ///
    /// The entry must not be served after `ttl` has elapsed.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove the key from the store.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}
