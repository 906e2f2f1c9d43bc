use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::entry::EntryOptions;
use crate::error::CacheError;

/// Default upper bound on a single distributed lookup.
pub const DEFAULT_DISTRIBUTED_TIMEOUT: Duration = Duration::from_secs(1);

/// Keys longer than this are not cached.
pub const DEFAULT_MAX_KEY_LENGTH: usize = 1024;

/// Encoded values larger than this are not written to the distributed tier.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Settings for a `HybridCache`.
///
/// Every field has a default, so a config file only needs the values it
/// changes. Durations use humantime notation (`"500ms"`, `"5s"`, `"2m"`).
///
/// # Example
/// ```
/// use hybrid_cache::HybridCacheConfig;
///
/// let config: HybridCacheConfig = serde_json::from_str(r#"{
///     "namespace": "weather",
///     "default_entry_options": { "local_expiration": "5s", "distributed_expiration": "10s" }
/// }"#).unwrap();
///
/// assert_eq!(config.namespace.as_deref(), Some("weather"));
/// assert_eq!(config.max_key_length, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HybridCacheConfig {
    /// Prefix for distributed keys, so several applications can share one store.
    pub namespace: Option<String>,

    /// Maximum number of entries held by the local tier.
    pub local_max_capacity: u64,

    /// Entry options used when a call does not pass its own.
    pub default_entry_options: EntryOptions,

    /// How long a distributed lookup may take before it counts as a miss.
    #[serde(with = "humantime_serde")]
    pub distributed_timeout: Duration,

    /// Longest key that is still cached.
    pub max_key_length: usize,

    /// Largest encoded value written to the distributed tier.
    pub max_payload_bytes: usize,
}

impl Default for HybridCacheConfig {
    fn default() -> Self {
        HybridCacheConfig {
            namespace: None,
            local_max_capacity: 10_000,
            default_entry_options: EntryOptions::default(),
            distributed_timeout: DEFAULT_DISTRIBUTED_TIMEOUT,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl HybridCacheConfig {
    /// Load the configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Serialization(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_json(&raw)
    }

    /// Parse the configuration from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, CacheError> {
        serde_json::from_str(raw)
            .map_err(|e| CacheError::Serialization(format!("Invalid cache config: {}", e)))
    }
}
