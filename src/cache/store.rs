//! State Store Module
//!
//! Bounded map from key fingerprint to a reactive cell holding a
//! [`CacheResult`]. All transitions go through the typed operations here;
//! the watch cell has a single writer (this store) and any number of
//! subscribed readers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheResult, CacheStats, InsertionOrder};
use crate::error::{CacheError, Result};
use crate::tasks::KeyTimers;

// == Entry Handle ==
/// One resident entry: the original argument value, the reactive cell, the
/// last good value (kept for `Failed` fallback across reloads), and any
/// pending timers. Dropping the handle aborts the timers.
struct EntryHandle<A, V> {
    args: A,
    tx: watch::Sender<CacheResult<V>>,
    last_value: Option<V>,
    timers: KeyTimers,
}

impl<A, V: Clone> EntryHandle<A, V> {
    /// Pulls the currently visible value into `last_value` before a
    /// transition that would hide it.
    fn stash_value(&mut self) {
        let visible = match &*self.tx.borrow() {
            CacheResult::Loaded { value, .. } | CacheResult::Obsolete { value, .. } => {
                Some(value.clone())
            }
            CacheResult::Failed { value, .. } => value.clone(),
            _ => None,
        };
        if visible.is_some() {
            self.last_value = visible;
        }
    }
}

// == State Store ==
/// Owns the bounded fingerprint → cell mapping and enforces capacity.
///
/// When a new key is about to be created at capacity, the single oldest
/// entry by insertion order is evicted first. Reads never promote, so
/// "oldest" always means first-inserted. The entry being created is never
/// the victim (it is not yet in the map when eviction runs).
pub struct StateStore<A, V> {
    inner: Mutex<StoreInner<A, V>>,
    capacity: Option<usize>,
}

struct StoreInner<A, V> {
    entries: HashMap<String, EntryHandle<A, V>>,
    order: InsertionOrder,
    stats: CacheStats,
    disposed: bool,
}

impl<A, V> StateStore<A, V>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty store with an optional capacity bound.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                order: InsertionOrder::new(),
                stats: CacheStats::new(),
                disposed: false,
            }),
            capacity,
        }
    }

    fn locked(&self) -> MutexGuard<'_, StoreInner<A, V>> {
        self.inner.lock().expect("state store mutex poisoned")
    }

    /// Creates an entry for `key`, evicting the oldest entry first when the
    /// store is at capacity.
    fn create_entry(inner: &mut StoreInner<A, V>, capacity: Option<usize>, key: &str, args: &A) {
        if let Some(cap) = capacity {
            if cap > 0 && inner.entries.len() >= cap {
                if let Some(victim) = inner.order.pop_oldest() {
                    if inner.entries.remove(&victim).is_some() {
                        inner.stats.record_eviction();
                        debug!(key = %victim, "evicted oldest entry to hold capacity");
                    }
                }
            }
        }

        let (tx, _rx) = watch::channel(CacheResult::Uninitialized);
        inner.entries.insert(
            key.to_string(),
            EntryHandle {
                args: args.clone(),
                tx,
                last_value: None,
                timers: KeyTimers::default(),
            },
        );
        inner.order.record(key);
        let count = inner.entries.len();
        inner.stats.set_total_entries(count);
    }

    // == Cell ==
    /// Subscribes to the entry's reactive cell, creating the entry as
    /// `Uninitialized` if it does not exist yet.
    pub fn cell(&self, key: &str, args: &A) -> Result<watch::Receiver<CacheResult<V>>> {
        let mut inner = self.locked();
        if inner.disposed {
            return Err(CacheError::Disposed);
        }
        if !inner.entries.contains_key(key) {
            Self::create_entry(&mut inner, self.capacity, key, args);
        }
        match inner.entries.get(key) {
            Some(entry) => Ok(entry.tx.subscribe()),
            None => Err(CacheError::Disposed),
        }
    }

    // == Set Loading ==
    /// Transitions the entry to `Loading`, creating it if needed.
    ///
    /// Stashes the currently visible value for later `Failed` fallback and
    /// cancels pending timers, since they were scheduled for a value this
    /// load is about to replace. Counts a miss.
    pub fn set_loading(&self, key: &str, args: &A) -> Result<()> {
        let mut inner = self.locked();
        if inner.disposed {
            return Err(CacheError::Disposed);
        }
        if !inner.entries.contains_key(key) {
            Self::create_entry(&mut inner, self.capacity, key, args);
        }
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.timers.cancel();
            entry.stash_value();
            entry.tx.send_replace(CacheResult::Loading {
                updated_at: Utc::now(),
            });
        }
        inner.stats.record_miss();
        Ok(())
    }

    // == Set Loaded ==
    /// Transitions to `Loaded` with a fresh timestamp; the only path that
    /// produces a trusted fresh value.
    ///
    /// Returns false when the entry vanished while the load was in flight
    /// (removed or evicted); the freshly loaded value is then simply not
    /// retained.
    pub fn set_loaded(&self, key: &str, value: V) -> bool {
        let mut inner = self.locked();
        let Some(entry) = inner.entries.get_mut(key) else {
            return false;
        };
        entry.last_value = Some(value.clone());
        entry.tx.send_replace(CacheResult::Loaded {
            value,
            updated_at: Utc::now(),
        });
        true
    }

    // == Set Failed ==
    /// Transitions to `Failed`, attaching the last known good value when one
    /// exists. Returns false when the entry vanished mid-load.
    pub fn set_failed(&self, key: &str, error: Arc<anyhow::Error>) -> bool {
        let mut inner = self.locked();
        let Some(entry) = inner.entries.get_mut(key) else {
            return false;
        };
        let retained = entry.last_value.clone();
        entry.tx.send_replace(CacheResult::Failed {
            error,
            value: retained,
            updated_at: Utc::now(),
        });
        true
    }

    // == Set Obsolete ==
    /// Flags a previously loaded value as stale, keeping it visible.
    ///
    /// Obsolescence is only meaningful for data that was once fresh: an
    /// absent entry (the implicit `Uninitialized`), a `Loading` entry, or a
    /// `Failed` entry with no retained value fails with
    /// [`CacheError::CannotObsoleteUnloaded`].
    pub fn set_obsolete(&self, key: &str) -> Result<()> {
        let mut inner = self.locked();
        let Some(entry) = inner.entries.get_mut(key) else {
            return Err(CacheError::CannotObsoleteUnloaded(key.to_string()));
        };
        let current = entry.tx.borrow().clone();
        let value = match current {
            CacheResult::Loaded { value, .. } | CacheResult::Obsolete { value, .. } => value,
            CacheResult::Failed {
                value: Some(value), ..
            } => value,
            _ => return Err(CacheError::CannotObsoleteUnloaded(key.to_string())),
        };
        entry.tx.send_replace(CacheResult::Obsolete {
            value,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    // == Set Value ==
    /// Explicit override: stores any well-formed result, bypassing the
    /// loader entirely. Used for out-of-band injection such as optimistic
    /// updates or test seeding. Creates the entry if needed (capacity
    /// enforced) and cancels pending timers.
    pub fn set_value(&self, key: &str, args: &A, result: CacheResult<V>) -> Result<()> {
        let mut inner = self.locked();
        if inner.disposed {
            return Err(CacheError::Disposed);
        }
        if !inner.entries.contains_key(key) {
            Self::create_entry(&mut inner, self.capacity, key, args);
        }
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.timers.cancel();
            if let Some(value) = result.display_value() {
                entry.last_value = Some(value.clone());
            }
            entry.tx.send_replace(result);
        }
        Ok(())
    }

    // == Remove ==
    /// Deletes the entry, aborting its pending timers. Returns whether an
    /// entry existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.locked();
        let existed = inner.entries.remove(key).is_some();
        if existed {
            inner.order.remove(key);
            let count = inner.entries.len();
            inner.stats.set_total_entries(count);
        }
        existed
    }

    // == Range Operations ==
    /// Snapshot of every entry currently holding a value, as
    /// `(key, value, args)` triples. Entries added after the snapshot are
    /// not visited by the range operations built on it.
    fn values_snapshot(&self) -> Vec<(String, V, A)> {
        let inner = self.locked();
        inner
            .entries
            .iter()
            .filter_map(|(key, entry)| {
                let value = match &*entry.tx.borrow() {
                    CacheResult::Loaded { value, .. } | CacheResult::Obsolete { value, .. } => {
                        Some(value.clone())
                    }
                    CacheResult::Failed { value, .. } => value.clone(),
                    _ => None,
                }?;
                Some((key.clone(), value, entry.args.clone()))
            })
            .collect()
    }

    /// Marks every entry whose `(value, args)` matches the predicate as
    /// obsolete. The predicate runs outside the store lock. Returns the
    /// number of entries transitioned.
    pub fn obsolete_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&V, &A) -> bool,
    {
        let mut affected = 0;
        for (key, value, args) in self.values_snapshot() {
            // The entry may have changed since the snapshot; losing the race
            // is not an error.
            if predicate(&value, &args) && self.set_obsolete(&key).is_ok() {
                affected += 1;
            }
        }
        affected
    }

    /// Removes every entry whose `(value, args)` matches the predicate.
    /// Returns the number of entries removed.
    pub fn remove_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&V, &A) -> bool,
    {
        let mut affected = 0;
        for (key, value, args) in self.values_snapshot() {
            if predicate(&value, &args) && self.remove(&key) {
                affected += 1;
            }
        }
        affected
    }

    // == Flush ==
    /// Removes every entry unconditionally. Returns how many were removed.
    pub fn flush(&self) -> usize {
        let mut inner = self.locked();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        inner.stats.set_total_entries(0);
        removed
    }

    // == Inspection ==
    /// Number of resident entries, placeholders included.
    pub fn count(&self) -> usize {
        self.locked().entries.len()
    }

    /// True iff an entry exists for the key, in any status.
    pub fn contains(&self, key: &str) -> bool {
        self.locked().entries.contains_key(key)
    }

    /// The entry's current result, if the entry exists.
    pub fn current(&self, key: &str) -> Option<CacheResult<V>> {
        self.locked()
            .entries
            .get(key)
            .map(|entry| entry.tx.borrow().clone())
    }

    /// The lock-free read path: the value if (and only if) the entry reads
    /// `Loaded` right now. Counts a hit when it does.
    pub fn fresh_value(&self, key: &str) -> Option<V> {
        let mut inner = self.locked();
        let fresh = inner.entries.get(key).and_then(|entry| {
            if let CacheResult::Loaded { value, .. } = &*entry.tx.borrow() {
                Some(value.clone())
            } else {
                None
            }
        });
        if fresh.is_some() {
            inner.stats.record_hit();
        }
        fresh
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.locked();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    // == Timer Registry ==
    /// Installs the pending timers for an entry, aborting any previous
    /// ones. Handles for an entry that vanished in the meantime are aborted
    /// immediately.
    pub fn attach_timers(
        &self,
        key: &str,
        stale: Option<JoinHandle<()>>,
        expiry: Option<JoinHandle<()>>,
    ) {
        let mut inner = self.locked();
        match inner.entries.get_mut(key) {
            Some(entry) => entry.timers.replace(stale, expiry),
            None => {
                if let Some(handle) = stale {
                    handle.abort();
                }
                if let Some(handle) = expiry {
                    handle.abort();
                }
            }
        }
    }

    /// Aborts the entry's pending timers without removing the entry.
    pub fn clear_timers(&self, key: &str) {
        let mut inner = self.locked();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.timers.cancel();
        }
    }

    // == Dispose ==
    /// Drops every entry (aborting pending timers via their handles) and
    /// rejects subsequent entry-creating operations with
    /// [`CacheError::Disposed`].
    pub fn dispose(&self) {
        let mut inner = self.locked();
        inner.disposed = true;
        inner.entries.clear();
        inner.order.clear();
        inner.stats.set_total_entries(0);
    }
}
