//! Cache Statistics Module
//!
//! Tracks engine performance counters: hits, misses, and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Engine performance counters.
///
/// A hit is a `get` answered without invoking the loader; a miss is counted
/// each time a load begins for a key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// `get` calls served from a fresh entry
    pub hits: u64,
    /// Loads triggered by `get`/`reload`
    pub misses: u64,
    /// Entries evicted to hold the capacity bound
    pub evictions: u64,
    /// Current number of resident entries
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was requested yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Update Entry Count ==
    /// Updates the resident entry count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
