//! Metrics middleware for distributed stores.
//!
//! This module provides a `MetricsStore` wrapper that emits metrics for all
//! distributed tier operations (reads, writes, removes) to a user-provided sink.
//! Tier errors are absorbed by the hybrid cache, so this is where they become
//! visible.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hybrid_cache::{DistributedStore, MemoryDistributedStore, MetricsStore};
//!
//! // Create metrics sink
//! let sink = Arc::new(MyMetricsSink::new());
//!
//! // Wrap store with metrics
//! let redis = Arc::new(RedisStore::new(config).await?);
//! let store: Arc<dyn DistributedStore> = Arc::new(MetricsStore::new(redis, sink.clone()));
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::store::DistributedStore;

/// Metrics emitted by the MetricsStore wrapper.
#[derive(Debug, Clone)]
pub enum CacheMetric {
    /// Emitted on every read (get) operation.
    Read {
        /// The cache key that was read.
        key: String,
        /// Whether the key was found.
        hit: bool,
        /// Whether the store returned an error.
        error: bool,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from DistributedStore::name()).
        tier: String,
    },
    /// Emitted on every write (set) operation.
    Write {
        /// The cache key that was written.
        key: String,
        /// Size of the written payload in bytes.
        bytes: usize,
        /// Whether the store returned an error.
        error: bool,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from DistributedStore::name()).
        tier: String,
    },
    /// Emitted on every remove operation.
    Remove {
        /// The cache key that was removed.
        key: String,
        /// Whether the store returned an error.
        error: bool,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from DistributedStore::name()).
        tier: String,
    },
}

/// Trait for receiving cache metrics.
///
/// Implement this trait to collect metrics from `MetricsStore`.
///
/// # Example
///
/// ```ignore
/// use std::sync::Mutex;
/// use async_trait::async_trait;
/// use hybrid_cache::{CacheMetric, MetricsSink};
///
/// struct BufferedSink {
///     buffer: Mutex<Vec<CacheMetric>>,
/// }
///
/// #[async_trait]
/// impl MetricsSink for BufferedSink {
///     fn emit(&self, metric: CacheMetric) {
///         self.buffer.lock().unwrap().push(metric);
///     }
///
///     async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///         // Send buffered metrics to your backend
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Emit a single metric.
    ///
    /// This is called synchronously in the hot path of cache operations.
    /// Implementations should be fast (e.g., buffer metrics in memory).
    fn emit(&self, metric: CacheMetric);

    /// Flush any buffered metrics.
    ///
    /// Called when the caller wants to ensure all metrics are persisted.
    /// This is typically called at shutdown or at periodic intervals.
    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A sink that forwards every metric to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl MetricsSink for TracingSink {
    fn emit(&self, metric: CacheMetric) {
        match metric {
            CacheMetric::Read {
                key,
                hit,
                error,
                latency_ms,
                tier,
            } => tracing::debug!(%key, hit, error, latency_ms, %tier, "distributed read"),
            CacheMetric::Write {
                key,
                bytes,
                error,
                latency_ms,
                tier,
            } => tracing::debug!(%key, bytes, error, latency_ms, %tier, "distributed write"),
            CacheMetric::Remove {
                key,
                error,
                latency_ms,
                tier,
            } => tracing::debug!(%key, error, latency_ms, %tier, "distributed remove"),
        }
    }

    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// A store wrapper that emits metrics for all operations.
///
/// `MetricsStore` wraps any `DistributedStore` implementation and emits
/// metrics for read, write, and remove operations to a user-provided sink.
///
/// # Example
///
/// ```ignore
/// let inner = Arc::new(MemoryDistributedStore::default());
/// let sink = Arc::new(MyMetricsSink::new());
/// let store: Arc<dyn DistributedStore> = Arc::new(MetricsStore::new(inner, sink));
///
/// // Use store normally - metrics are emitted automatically
/// store.get("weather").await?;
/// ```
pub struct MetricsStore {
    inner: Arc<dyn DistributedStore>,
    sink: Arc<dyn MetricsSink>,
    tier_name: String,
}

impl MetricsStore {
    /// Create a new MetricsStore wrapping the given store.
    ///
    /// # Arguments
    /// * `inner` - The store to wrap
    /// * `sink` - The metrics sink to emit metrics to
    pub fn new(inner: Arc<dyn DistributedStore>, sink: Arc<dyn MetricsSink>) -> Self {
        let tier_name = inner.name().to_string();
        MetricsStore {
            inner,
            sink,
            tier_name,
        }
    }

    /// Get a reference to the metrics sink.
    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    fn elapsed_ms(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1000.0
    }
}

#[async_trait]
impl DistributedStore for MetricsStore {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(CacheMetric::Read {
            key: key.to_string(),
            hit: matches!(result, Ok(Some(_))),
            error: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let bytes = value.len();
        let start = Instant::now();
        let result = self.inner.set(key, value, ttl).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(CacheMetric::Write {
            key: key.to_string(),
            bytes,
            error: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.remove(key).await;
        let latency_ms = Self::elapsed_ms(start);

        self.sink.emit(CacheMetric::Remove {
            key: key.to_string(),
            error: result.is_err(),
            latency_ms,
            tier: self.tier_name.clone(),
        });

        result
    }
}
