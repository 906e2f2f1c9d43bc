//! Store implementations for the cache library.

pub mod local;
pub mod memory;
pub mod metrics;
pub mod redis;

pub use local::{LocalStore, LocalStoreConfig};
pub use memory::{MemoryDistributedStore, MemoryStoreConfig};
pub use metrics::{CacheMetric, MetricsSink, MetricsStore, TracingSink};
pub use redis::{RedisStore, RedisStoreConfig};
