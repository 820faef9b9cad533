//! Keyed single-flight execution
//!
//! `KeyedMutex` runs at most one operation per key at a time. Callers that
//! arrive while an operation is in flight join it and receive a clone of
//! its outcome instead of starting a second one.
//!
//! The operation runs on its own tokio task, so abandoning a caller (even
//! the one that started it) never cancels the work other callers are
//! waiting on. Each in-flight entry is a `watch` channel; the entry is
//! removed from the registry before the outcome is published, so a caller
//! arriving after completion always starts a fresh operation.

use crate::error::{PkgcacheError, PkgcacheResult};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

type Slot<T> = watch::Receiver<Option<PkgcacheResult<T>>>;
type Registry<T> = Arc<Mutex<HashMap<String, Slot<T>>>>;

/// Registry of in-flight operations, keyed by string
#[derive(Debug)]
pub struct KeyedMutex<T> {
    inflight: Registry<T>,
}

impl<T> KeyedMutex<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `operation` for `key`, or join the run already in flight.
    ///
    /// Every caller for the same in-flight run receives the same outcome.
    /// Must be called from within a tokio runtime.
    pub async fn run<F, Fut>(&self, key: &str, operation: F) -> PkgcacheResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PkgcacheResult<T>> + Send + 'static,
    {
        let slot = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(key) {
                Some(slot) => {
                    debug!(key, "Joining in-flight operation");
                    slot.clone()
                }
                None => {
                    // Build the future before registering the key: a panic
                    // here must not leave a slot nobody will ever fill.
                    let fut = operation();
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.to_string(), rx.clone());
                    trace!(key, "Starting operation");
                    self.spawn(key.to_string(), tx, fut);
                    rx
                }
            }
        };

        wait(key, slot).await
    }

    /// Number of keys with an operation currently in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.inflight).len()
    }

    /// Whether an operation is currently in flight for `key`
    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.inflight).contains_key(key)
    }

    fn spawn<Fut>(
        &self,
        key: String,
        tx: watch::Sender<Option<PkgcacheResult<T>>>,
        operation: Fut,
    ) where
        Fut: Future<Output = PkgcacheResult<T>> + Send + 'static,
    {
        let registry = Arc::clone(&self.inflight);
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(operation).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(key = %key, "Operation panicked");
                    Err(PkgcacheError::Aborted { key: key.clone() })
                }
            };

            // Free the key first so late callers start fresh rather than
            // observing this outcome.
            let mut inflight = lock(&registry);
            inflight.remove(&key);
            tx.send_replace(Some(outcome));
            trace!(key = %key, "Operation complete");
        });
    }
}

impl<T> Default for KeyedMutex<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn wait<T: Clone>(key: &str, mut slot: Slot<T>) -> PkgcacheResult<T> {
    match slot.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone().unwrap_or_else(|| {
            Err(PkgcacheError::Internal(format!(
                "operation for {key} published no outcome"
            )))
        }),
        // Sender dropped without publishing: the task was torn down with
        // the runtime.
        Err(_) => Err(PkgcacheError::Aborted {
            key: key.to_string(),
        }),
    }
}

fn lock<T>(
    registry: &Mutex<HashMap<String, Slot<T>>>,
) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
