//! Lock Manager Module
//!
//! Per-key mutual exclusion: at most one holder at a time per fingerprint,
//! with FIFO handoff to waiters. Contention on one key never blocks callers
//! working on other keys.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{CacheError, Result};

// == Lock Manager ==
/// Grants at most one [`KeyGuard`] at a time per key.
///
/// A key is "tracked" while it has a holder or waiters; releasing with an
/// empty queue removes the key entirely, so uncontended keys leave no
/// bookkeeping behind.
///
/// Cloning is cheap and yields a handle to the same lock table.
#[derive(Clone, Default)]
pub struct LockManager {
    inner: Arc<Mutex<LockInner>>,
}

#[derive(Default)]
struct LockInner {
    keys: HashMap<String, KeyQueue>,
    disposed: bool,
}

/// Waiters for a key, in arrival order. Presence of the queue in the map
/// means the key is currently held.
#[derive(Default)]
struct KeyQueue {
    waiters: VecDeque<oneshot::Sender<KeyGuard>>,
}

impl LockManager {
    // == Constructor ==
    /// Creates a new lock manager with no tracked keys.
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, LockInner> {
        self.inner.lock().expect("lock manager mutex poisoned")
    }

    // == Acquire ==
    /// Suspends until the caller is the sole holder for `key`.
    ///
    /// Waiters are serviced in arrival order, so no caller starves. The
    /// returned guard releases the lock when dropped, which covers every
    /// exit path including error propagation and cancelled futures.
    ///
    /// # Errors
    /// Returns [`CacheError::Disposed`] if the manager is disposed, either
    /// up front or while the caller is suspended.
    pub async fn acquire(&self, key: &str) -> Result<KeyGuard> {
        let rx = {
            let mut inner = self.locked();
            if inner.disposed {
                return Err(CacheError::Disposed);
            }
            if !inner.keys.contains_key(key) {
                // Uncontended: take the lock immediately.
                inner.keys.insert(key.to_string(), KeyQueue::default());
                return Ok(KeyGuard::new(Arc::clone(&self.inner), key.to_string()));
            }
            let (tx, rx) = oneshot::channel();
            if let Some(queue) = inner.keys.get_mut(key) {
                queue.waiters.push_back(tx);
                trace!(%key, waiters = queue.waiters.len(), "queued for key lock");
            }
            rx
        };

        // The sender side hands over a ready-made guard; a dropped sender
        // means the manager was disposed while we waited.
        rx.await.map_err(|_| CacheError::Disposed)
    }

    // == Dispose ==
    /// Drops all bookkeeping and unblocks every suspended acquirer with
    /// [`CacheError::Disposed`]. Subsequent `acquire` calls fail the same
    /// way; releases from guards still alive become no-ops.
    pub fn dispose(&self) {
        let mut inner = self.locked();
        inner.disposed = true;
        for (_, queue) in inner.keys.drain() {
            // Dropping the senders resolves each waiting receiver with an
            // error.
            drop(queue);
        }
    }

    // == Tracked Keys ==
    /// Number of keys currently held or contended.
    pub fn tracked_keys(&self) -> usize {
        self.locked().keys.len()
    }
}

// == Key Guard ==
/// Exclusive hold on a single key. Dropping the guard releases the lock,
/// handing it to the next waiter in FIFO order.
pub struct KeyGuard {
    inner: Arc<Mutex<LockInner>>,
    key: String,
    armed: bool,
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard")
            .field("key", &self.key)
            .field("armed", &self.armed)
            .finish()
    }
}

impl KeyGuard {
    fn new(inner: Arc<Mutex<LockInner>>, key: String) -> Self {
        Self {
            inner,
            key,
            armed: true,
        }
    }

    /// The key this guard holds.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if self.armed {
            release(&self.inner, &self.key);
        }
    }
}

/// Hands the lock for `key` to the next live waiter, or frees the key's
/// queue entirely when none remain.
fn release(inner: &Arc<Mutex<LockInner>>, key: &str) {
    let mut guard = inner.lock().expect("lock manager mutex poisoned");
    loop {
        let Some(queue) = guard.keys.get_mut(key) else {
            // Released after dispose, or never tracked.
            return;
        };
        match queue.waiters.pop_front() {
            Some(tx) => {
                let next = KeyGuard::new(Arc::clone(inner), key.to_string());
                match tx.send(next) {
                    // Handed off; the key stays tracked under the new holder.
                    Ok(()) => return,
                    // The waiter gave up (its acquire future was dropped).
                    // Disarm the returned guard so dropping it here does not
                    // re-enter release, and try the next waiter.
                    Err(mut unclaimed) => {
                        unclaimed.armed = false;
                    }
                }
            }
            None => {
                guard.keys.remove(key);
                return;
            }
        }
    }
}
