use std::env;
use std::time::Duration;

/// Configuration for benchmarks, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Redis URL (from REDIS_URL env var). The in-process store is used when unset.
    pub redis_url: Option<String>,

    /// Simulated source latency in milliseconds (from SOURCE_LATENCY_MS env var, defaults to 50)
    pub source_latency_ms: u64,

    /// Simulated distributed store latency in microseconds (from STORE_LATENCY_US env var, defaults to 200)
    pub store_latency_us: u64,

    /// Sample size for benchmarks (from BENCH_SAMPLE_SIZE env var, defaults to 100)
    pub sample_size: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").ok(),
            source_latency_ms: env::var("SOURCE_LATENCY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
            store_latency_us: env::var("STORE_LATENCY_US")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200),
            sample_size: env::var("BENCH_SAMPLE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
        }
    }
}

impl BenchConfig {
    pub fn new() -> Self {
        let config = Self::default();
        eprintln!("Benchmark Configuration:");
        eprintln!(
            "  Distributed tier: {}",
            config.redis_url.as_deref().unwrap_or("in-process")
        );
        eprintln!("  Source Latency: {}ms", config.source_latency_ms);
        eprintln!("  Store Latency: {}us", config.store_latency_us);
        eprintln!("  Sample Size: {}", config.sample_size);
        config
    }

    pub fn store_latency(&self) -> Duration {
        Duration::from_micros(self.store_latency_us)
    }
}
