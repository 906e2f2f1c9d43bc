use rand::Rng;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Test data structure for benchmarks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchForecast {
    pub city_id: u64,
    pub city: String,
    pub temperature_c: i32,
    pub summary: String,
}

impl BenchForecast {
    pub fn new(city_id: u64) -> Self {
        Self {
            city_id,
            city: format!("City {}", city_id),
            temperature_c: (city_id % 75) as i32 - 20,
            summary: "Mild".to_string(),
        }
    }
}

/// Simulated weather service with configurable latency
#[derive(Clone)]
pub struct FakeSource {
    latency: Duration,
    call_count: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            latency: Duration::from_millis(latency_ms),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Produce the forecast for a `city:{id}` key.
    pub async fn fetch(&self, key: &str) -> Result<BenchForecast, Infallible> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        // Simulate upstream latency
        tokio::time::sleep(self.latency).await;

        let city_id = key
            .strip_prefix("city:")
            .and_then(|id| id.parse().ok())
            .unwrap_or_default();
        Ok(BenchForecast::new(city_id))
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    #[allow(dead_code)]
    pub fn reset_count(&self) {
        self.call_count.store(0, Ordering::Relaxed);
    }
}

/// Generate test keys for different workload patterns
pub struct KeyGenerator {
    num_keys: usize,
}

impl KeyGenerator {
    pub fn new(num_keys: usize) -> Self {
        Self { num_keys }
    }

    /// Generate sequential keys (for cold cache tests)
    pub fn sequential(&self) -> Vec<String> {
        (0..self.num_keys).map(|i| format!("city:{}", i)).collect()
    }

    /// Generate random keys with uniform distribution
    #[allow(dead_code)]
    pub fn uniform_random(&self, count: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| format!("city:{}", rng.gen_range(0..self.num_keys)))
            .collect()
    }

    /// Generate keys with Zipf distribution (realistic - few hot keys)
    pub fn zipf_random(&self, count: usize) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let mut keys = Vec::with_capacity(count);

        for _ in 0..count {
            // Simplified Zipf: 80% of requests go to 20% of keys
            let key_id = if rng.gen_bool(0.8) {
                rng.gen_range(0..(self.num_keys / 5))
            } else {
                rng.gen_range((self.num_keys / 5)..self.num_keys)
            };
            keys.push(format!("city:{}", key_id));
        }

        keys
    }
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn test_fake_source() {
        use super::FakeSource;

        let source = FakeSource::new(10);

        let forecast = source.fetch("city:7").await.unwrap();
        assert_eq!(forecast.city_id, 7);

        assert_eq!(source.call_count(), 1);
    }

    #[test]
    fn test_key_generator() {
        use super::KeyGenerator;

        let key_gen = KeyGenerator::new(100);

        let seq = key_gen.sequential();
        assert_eq!(seq.len(), 100);
        assert_eq!(seq[0], "city:0");

        let uniform = key_gen.uniform_random(50);
        assert_eq!(uniform.len(), 50);

        let zipf = key_gen.zipf_random(100);
        assert_eq!(zipf.len(), 100);
    }
}
