//! hybrid-cache - A two-tier get-or-create cache for Rust
//!
//! This library provides:
//! - An in-process tier with per-entry expiration
//! - A distributed tier behind a byte-oriented store trait (Redis included)
//! - Single-flight execution of the source computation per key
//! - Per-caller cancellation that never aborts work shared with other callers
//!
//! # Example
//!
//! ```ignore
//! use hybrid_cache::{EntryOptions, HybridCacheBuilder, RedisStore, RedisStoreConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let redis = RedisStore::new(RedisStoreConfig {
//!         url: "redis://localhost:6379".to_string(),
//!     })
//!     .await?;
//!
//!     let cache = HybridCacheBuilder::<String>::new()
//!         .distributed(Arc::new(redis))
//!         .namespace("weather")
//!         .build();
//!
//!     let options = EntryOptions::new(Duration::from_secs(5), Duration::from_secs(10));
//!     let forecast = cache
//!         .get_or_create(
//!             "today",
//!             |key| async move {
//!                 // Expensive call, runs once per key however many callers miss
//!                 Ok::<_, std::io::Error>(format!("forecast for {}", key))
//!             },
//!             Some(&options),
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     println!("{}", forecast);
//!     Ok(())
//! }
//! ```

mod builder;
mod config;
mod entry;
mod error;
mod flight;
mod hybrid;
mod store;
pub mod stores;
mod utils;

// Re-export public API
pub use builder::HybridCacheBuilder;
pub use config::{
    DEFAULT_DISTRIBUTED_TIMEOUT, DEFAULT_MAX_KEY_LENGTH, DEFAULT_MAX_PAYLOAD_BYTES,
    HybridCacheConfig,
};
pub use entry::{
    DEFAULT_DISTRIBUTED_EXPIRATION, DEFAULT_LOCAL_EXPIRATION, Entry, EntryFlags, EntryOptions,
};
pub use error::CacheError;
pub use flight::{Outcome, SingleFlight};
pub use hybrid::HybridCache;
pub use store::DistributedStore;
pub use stores::local::{LocalStore, LocalStoreConfig};
pub use stores::memory::{MemoryDistributedStore, MemoryStoreConfig};
pub use stores::metrics::{CacheMetric, MetricsSink, MetricsStore, TracingSink};
pub use stores::redis::{RedisStore, RedisStoreConfig};
pub use utils::{Deadline, build_cache_key, cancel_after};
