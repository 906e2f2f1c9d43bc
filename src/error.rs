use std::error::Error as StdError;
use std::sync::Arc;

/// Error type for cache operations.
///
/// `CacheError` is `Clone` so that a single source outcome can be handed to
/// every caller waiting on the same key.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The source computation (the caller's factory) failed.
    ///
    /// Delivered unchanged to every caller that was waiting on the same
    /// computation. Nothing is cached.
    #[error("source computation failed: {0}")]
    Source(Arc<dyn StdError + Send + Sync>),

    /// The caller's own wait was cancelled or its deadline expired.
    ///
    /// Other callers waiting on the same key are not affected.
    #[error("cache operation cancelled")]
    Cancelled,

    /// A tier operation failed (network, IO, timeout).
    #[error("[{tier}] cache error for key '{key}': {message}")]
    Store {
        tier: String,
        key: String,
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Create a new tier error.
    pub fn store(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Store {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wrap a factory error.
    pub fn from_source(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        CacheError::Source(Arc::from(err.into()))
    }

    /// Returns `true` if this is a source (factory) failure.
    pub fn is_source(&self) -> bool {
        matches!(self, CacheError::Source(_))
    }

    /// Returns `true` if the caller's wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CacheError::Cancelled)
    }

    /// Downcast the wrapped factory error to its concrete type.
    ///
    /// Returns `None` for non-source errors or when the type does not match.
    pub fn source_as<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            CacheError::Source(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("upstream returned {0}")]
    struct Upstream(u16);

    #[test]
    fn test_source_as_recovers_original_error() {
        let err = CacheError::from_source(Upstream(502));
        assert!(err.is_source());
        assert_eq!(err.source_as::<Upstream>().map(|e| e.0), Some(502));
        assert!(err.source_as::<std::io::Error>().is_none());
        assert_eq!(
            err.to_string(),
            "source computation failed: upstream returned 502"
        );
    }

    #[test]
    fn test_source_from_string() {
        let err = CacheError::from_source("boom");
        assert_eq!(err.to_string(), "source computation failed: boom");
    }

    #[test]
    fn test_clone_shares_source() {
        let err = CacheError::from_source(Upstream(500));
        let cloned = err.clone();
        match (&err, &cloned) {
            (CacheError::Source(a), CacheError::Source(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("Expected Source errors"),
        }
    }

    #[test]
    fn test_store_error_display() {
        let err = CacheError::store("redis", "weather", "GET failed: connection refused");
        assert!(!err.is_source());
        assert!(!err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "[redis] cache error for key 'weather': GET failed: connection refused"
        );
        assert!(CacheError::Cancelled.is_cancelled());
    }
}
