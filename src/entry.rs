use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Default local tier expiration.
pub const DEFAULT_LOCAL_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// Default distributed tier expiration.
pub const DEFAULT_DISTRIBUTED_EXPIRATION: Duration = Duration::from_secs(5 * 60);

/// Upper bound on how far ahead an expiration point is placed.
///
/// Longer TTLs, up to `Duration::MAX`, are treated as "never expires".
pub(crate) const MAX_EXPIRATION: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `ttl` after `now`, capped at `MAX_EXPIRATION`.
pub(crate) fn expiration_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_EXPIRATION))
        .unwrap_or_else(|| now + MAX_EXPIRATION)
}

/// Per-call entry options.
///
/// The two tiers expire independently. A distributed expiration at least as
/// long as the local one is the usual setup, but any ordering works: a local
/// entry that outlives its distributed copy is still served locally until it
/// expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryOptions {
    /// How long the value stays in the in-process tier.
    #[serde(with = "humantime_serde")]
    pub local_expiration: Duration,

    /// How long the value stays in the distributed tier.
    #[serde(with = "humantime_serde")]
    pub distributed_expiration: Duration,

    /// Per-tier read/write switches.
    pub flags: EntryFlags,
}

impl Default for EntryOptions {
    fn default() -> Self {
        EntryOptions {
            local_expiration: DEFAULT_LOCAL_EXPIRATION,
            distributed_expiration: DEFAULT_DISTRIBUTED_EXPIRATION,
            flags: EntryFlags::default(),
        }
    }
}

impl EntryOptions {
    /// Create entry options with the given tier expirations.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use hybrid_cache::EntryOptions;
    ///
    /// let options = EntryOptions::new(Duration::from_secs(5), Duration::from_secs(10));
    /// assert_eq!(options.local_expiration, Duration::from_secs(5));
    /// ```
    pub fn new(local_expiration: Duration, distributed_expiration: Duration) -> Self {
        EntryOptions {
            local_expiration,
            distributed_expiration,
            flags: EntryFlags::default(),
        }
    }

    /// Replace the tier flags.
    pub fn with_flags(mut self, flags: EntryFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Switches that bypass individual tier reads or writes for one call.
///
/// All switches are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFlags {
    /// Do not look the key up in the local tier.
    pub disable_local_read: bool,
    /// Do not populate the local tier.
    pub disable_local_write: bool,
    /// Do not look the key up in the distributed tier.
    pub disable_distributed_read: bool,
    /// Do not populate the distributed tier.
    pub disable_distributed_write: bool,
}

impl EntryFlags {
    /// Skip the local tier entirely.
    pub fn local_disabled() -> Self {
        EntryFlags {
            disable_local_read: true,
            disable_local_write: true,
            ..Default::default()
        }
    }

    /// Skip the distributed tier entirely.
    pub fn distributed_disabled() -> Self {
        EntryFlags {
            disable_distributed_read: true,
            disable_distributed_write: true,
            ..Default::default()
        }
    }
}

/// A value held by the local tier together with its lifetime.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The cached value.
    pub value: V,

    /// When the value was stored.
    pub stored_at: Instant,

    /// Do not serve the value at or after this point.
    pub expires_at: Instant,
}

impl<V> Entry<V> {
    /// Create an entry stored now that lives for `ttl`.
    pub fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Entry {
            value,
            stored_at: now,
            expires_at: expiration_after(now, ttl),
        }
    }

    /// Check if the entry has expired and should not be used.
    ///
    /// An entry is expired from `expires_at` onwards.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Whether both entries come from the same write.
    pub(crate) fn same_write(&self, other: &Entry<V>) -> bool {
        self.stored_at == other.stored_at && self.expires_at == other.expires_at
    }

    /// Remaining lifetime, zero once expired.
    pub fn time_to_live(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
