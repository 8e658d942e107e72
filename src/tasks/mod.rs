//! Background Tasks Module
//!
//! Deferred per-entry tasks scheduled by the cache facade after a successful
//! load: staleness marking and expiry removal.

mod timers;

pub use timers::{spawn_expiry_timer, spawn_stale_timer, KeyTimers};
