use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::entry::expiration_after;
use crate::error::CacheError;
use crate::store::DistributedStore;

/// Configuration for MemoryDistributedStore.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    /// Remove expired entries on `set` once the map holds more than this many items.
    ///
    /// `None` disables the sweep; expired entries are then only dropped on read.
    pub sweep_above: Option<usize>,

    /// Artificial latency added to every operation, to mimic a network hop.
    pub latency: Option<Duration>,
}

/// Internal stored bytes with expiration time.
struct StoredBytes {
    expires: Instant,
    data: Vec<u8>,
}

/// In-process stand-in for a distributed store.
///
/// Holds bytes in a `HashMap` behind a `RwLock`, with the same contract as a
/// networked store: per-entry TTL, byte values, fallible operations. Used by
/// tests, benchmarks and the demo binary when no Redis URL is configured.
///
/// Reads and writes can be switched to fail, which exercises the cache's
/// degrade-to-miss handling.
#[derive(Default)]
pub struct MemoryDistributedStore {
    state: RwLock<HashMap<String, StoredBytes>>,
    config: MemoryStoreConfig,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryDistributedStore {
    /// Create a new store with the given configuration.
    pub fn new(config: MemoryStoreConfig) -> Self {
        MemoryDistributedStore {
            config,
            ..Default::default()
        }
    }

    /// Make every subsequent `get` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `set` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get` calls seen so far, including failed ones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set` calls seen so far, including failed ones.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Whether a live entry exists for the key, without counting as a read.
    pub async fn contains(&self, key: &str) -> bool {
        let state = self.state.read().await;
        state
            .get(key)
            .is_some_and(|stored| stored.expires > Instant::now())
    }

    /// Store raw bytes directly, bypassing failure injection and counters.
    pub async fn put_raw(&self, key: &str, data: Vec<u8>, ttl: Duration) {
        let mut state = self.state.write().await;
        state.insert(
            key.to_string(),
            StoredBytes {
                expires: expiration_after(Instant::now(), ttl),
                data,
            },
        );
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.config.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn maybe_sweep(&self) {
        let Some(limit) = self.config.sweep_above else {
            return;
        };

        let mut state = self.state.write().await;
        if state.len() > limit {
            let now = Instant::now();
            state.retain(|_, v| v.expires > now);
        }
    }
}

#[async_trait]
impl DistributedStore for MemoryDistributedStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::store(self.name(), key, "GET failed: store unavailable"));
        }

        let state = self.state.read().await;

        let Some(stored) = state.get(key) else {
            return Ok(None);
        };

        let now = Instant::now();
        if stored.expires <= now {
            // Entry is expired, remove it unless a writer replaced it meanwhile
            drop(state);
            let mut state = self.state.write().await;
            if state.get(key).is_some_and(|stored| stored.expires <= now) {
                state.remove(key);
            }
            return Ok(None);
        }

        Ok(Some(stored.data.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::store(self.name(), key, "SET failed: store unavailable"));
        }

        {
            let mut state = self.state.write().await;
            state.insert(
                key.to_string(),
                StoredBytes {
                    expires: expiration_after(Instant::now(), ttl),
                    data: value,
                },
            );
        }

        self.maybe_sweep().await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        state.remove(key);
        Ok(())
    }
}
