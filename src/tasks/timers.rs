//! Staleness and Expiry Timers
//!
//! Deferred per-entry tasks scheduled after a successful load: one marks the
//! entry obsolete once the staleness window elapses, the other removes the
//! entry outright once its cache time elapses.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::cache::StateStore;

// == Key Timers ==
/// Pending timer handles for one entry.
///
/// Held inside the entry itself, so every removal path (explicit removal,
/// predicate removal, flush, capacity eviction, dispose) aborts the timers
/// when the entry is dropped. A stale callback therefore never fires against
/// an unrelated later entry that reuses the same key.
#[derive(Debug, Default)]
pub struct KeyTimers {
    stale: Option<JoinHandle<()>>,
    expiry: Option<JoinHandle<()>>,
}

impl KeyTimers {
    /// Aborts and forgets both timers.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.stale.take() {
            handle.abort();
        }
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
    }

    /// Replaces the pending timers, aborting any previous ones.
    pub fn replace(&mut self, stale: Option<JoinHandle<()>>, expiry: Option<JoinHandle<()>>) {
        self.cancel();
        self.stale = stale;
        self.expiry = expiry;
    }
}

impl Drop for KeyTimers {
    fn drop(&mut self) {
        self.cancel();
    }
}

// == Stale Timer ==
/// Spawns a task that marks `key` obsolete after `delay`.
///
/// By the time the timer fires the entry may have been removed or replaced;
/// the resulting `CannotObsoleteUnloaded` is the expected outcome of that
/// race and is only traced. Any other error is a fault and is logged as
/// such; the distinction is an explicit match on the error kind, not
/// downcasting.
pub fn spawn_stale_timer<A, V>(
    store: Arc<StateStore<A, V>>,
    key: String,
    delay: Duration,
) -> JoinHandle<()>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match store.set_obsolete(&key) {
            Ok(()) => debug!(%key, "staleness window elapsed, entry marked obsolete"),
            Err(err) if err.is_obsolete_precondition() => {
                trace!(%key, "staleness timer fired for an entry no longer loaded")
            }
            Err(err) => error!(%key, %err, "staleness timer failed"),
        }
    })
}

// == Expiry Timer ==
/// Spawns a task that removes `key` after `delay`, independent of the
/// staleness timer.
pub fn spawn_expiry_timer<A, V>(
    store: Arc<StateStore<A, V>>,
    key: String,
    delay: Duration,
) -> JoinHandle<()>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let existed = store.remove(&key);
        debug!(%key, existed, "cache time elapsed");
    })
}
