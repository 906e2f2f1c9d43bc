//! Single-flight coordination of source computations.
//!
//! When several callers miss both tiers for the same key at once, only the
//! first one starts the source computation. Everyone who arrives while it is
//! running waits on the same result slot and receives the same outcome,
//! value or error.
//!
//! The computation runs in its own task, so a caller that gives up (its
//! token is cancelled, or its future is dropped) only abandons its own wait.
//! If every caller gives up the computation still runs to completion; its
//! result is already paid for and the wrapped factory uses it to fill the
//! tiers.

use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::CacheError;

/// Outcome of one source computation, shared by all of its waiters.
pub type Outcome<V> = Result<V, CacheError>;

type Slot<V> = watch::Receiver<Option<Outcome<V>>>;
type InFlightTable<V> = Arc<Mutex<HashMap<String, InFlight<V>>>>;

/// A computation that has been started and not yet published.
struct InFlight<V> {
    slot: Slot<V>,
    waiters: Arc<AtomicUsize>,
}

/// Deduplicates concurrent computations per key.
///
/// The table lock is only held to look up, insert or remove an entry. The
/// factory is invoked and awaited outside of it, so a slow key never blocks
/// other keys.
pub struct SingleFlight<V> {
    in_flight: InFlightTable<V>,
}

impl<V> Clone for SingleFlight<V> {
    fn clone(&self) -> Self {
        SingleFlight {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        SingleFlight {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Counts a caller as waiting for as long as it is alive.
struct WaiterGuard {
    waiters: Arc<AtomicUsize>,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.waiters.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Removes the in-flight entry when dropped.
///
/// Owned by whoever currently drives the computation, so the entry goes away
/// after publication and also when the factory panics or the driver task is
/// torn down.
struct FlightCleanup<V> {
    table: InFlightTable<V>,
    key: String,
}

impl<V> Drop for FlightCleanup<V> {
    fn drop(&mut self) {
        self.table.lock().remove(&self.key);
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `factory` for `key` unless a computation for it is already running,
    /// and wait for the shared outcome.
    ///
    /// Only the first caller's `factory` is invoked; the others are dropped
    /// unused. Returns `CacheError::Cancelled` if `cancel` fires before the
    /// outcome is published. That only ends this caller's wait.
    pub async fn run<F, Fut>(&self, key: &str, cancel: &CancellationToken, factory: F) -> Outcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<V>> + Send + 'static,
    {
        let (slot, waiters, leader) = {
            let mut table = self.in_flight.lock();

            match table.get(key) {
                Some(flight) => {
                    flight.waiters.fetch_add(1, Ordering::AcqRel);
                    (flight.slot.clone(), Arc::clone(&flight.waiters), None)
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    let waiters = Arc::new(AtomicUsize::new(1));
                    table.insert(
                        key.to_string(),
                        InFlight {
                            slot: rx.clone(),
                            waiters: Arc::clone(&waiters),
                        },
                    );
                    (rx, waiters, Some(tx))
                }
            }
        };
        let _waiter = WaiterGuard { waiters };

        if let Some(tx) = leader {
            let cleanup = FlightCleanup {
                table: Arc::clone(&self.in_flight),
                key: key.to_string(),
            };
            tracing::debug!(key, "starting source computation");
            let computation = factory();
            tokio::spawn(Self::drive(cleanup, tx, computation));
        } else {
            tracing::debug!(key, "joining in-flight source computation");
            drop(factory);
        }

        Self::wait(slot, cancel).await
    }

    /// Number of callers currently waiting on the computation for `key`.
    ///
    /// Returns `None` if nothing is in flight for the key.
    pub fn waiters(&self, key: &str) -> Option<usize> {
        let table = self.in_flight.lock();
        table
            .get(key)
            .map(|flight| flight.waiters.load(Ordering::Acquire))
    }

    /// Number of keys with a computation in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn drive<Fut>(cleanup: FlightCleanup<V>, tx: watch::Sender<Option<Outcome<V>>>, computation: Fut)
    where
        Fut: Future<Output = Outcome<V>> + Send + 'static,
    {
        let outcome = AssertUnwindSafe(computation)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!(key = %cleanup.key, "source computation panicked");
                Err(CacheError::from_source("source computation panicked"))
            });

        // Publish first so every current waiter sees the outcome, then retire the entry.
        tx.send_replace(Some(outcome));
        drop(cleanup);
    }

    async fn wait(mut slot: Slot<V>, cancel: &CancellationToken) -> Outcome<V> {
        let published = async move {
            match slot.wait_for(Option::is_some).await {
                Ok(outcome) => outcome.clone(),
                // The driver went away without publishing
                Err(_) => None,
            }
        };

        tokio::select! {
            biased;
            outcome = published => outcome.unwrap_or_else(|| {
                Err(CacheError::from_source("source computation was abandoned"))
            }),
            () = cancel.cancelled() => Err(CacheError::Cancelled),
        }
    }
}
