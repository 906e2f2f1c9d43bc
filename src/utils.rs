//! Shared utilities for the cache library.

use std::fmt::Display;
use std::ops::Deref;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Build a composite cache key from namespace and key.
///
/// Format: `{namespace}::{key}`
pub fn build_cache_key<N: Display>(namespace: &N, key: &str) -> String {
    format!("{}::{}", namespace, key)
}

/// A cancellation token that fires once its deadline passes.
///
/// Dereferences to the underlying [`CancellationToken`]. Dropping the
/// deadline cancels the token and stops its timer, so clones taken with
/// `clone()` observe the cancellation too.
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    _guard: DropGuard,
}

impl Deref for Deadline {
    type Target = CancellationToken;

    fn deref(&self) -> &CancellationToken {
        &self.token
    }
}

/// Return a child of `parent` that is also cancelled once `timeout` elapses.
///
/// The cache treats an expired deadline exactly like an explicit
/// cancellation, so callers express timeouts through this token rather than
/// by dropping the `get_or_create` future.
///
/// Must be called from within a tokio runtime.
pub fn cancel_after(parent: &CancellationToken, timeout: Duration) -> Deadline {
    let token = parent.child_token();
    let timer = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = timer.cancelled() => {}
            () = tokio::time::sleep(timeout) => timer.cancel(),
        }
    });

    Deadline {
        _guard: token.clone().drop_guard(),
        token,
    }
}
