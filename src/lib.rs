//! loadcache - A keyed asynchronous cache engine
//!
//! Coordinates concurrent producers around a user-supplied loader:
//! at-most-one concurrent load per key, reactive status subscriptions,
//! time-based staleness and expiry, and capacity-bounded eviction.
//!
//! # Overview
//!
//! [`Cache`] composes three collaborators:
//!
//! - [`key::KeyCodec`] derives a canonical string fingerprint from the
//!   loader's argument value (structural JSON serialization by default);
//! - [`lock::LockManager`] serializes load attempts per fingerprint, FIFO,
//!   without blocking unrelated keys;
//! - [`cache::StateStore`] owns the bounded fingerprint → reactive cell
//!   mapping and every typed state transition.
//!
//! Consumers either call [`Cache::get`] directly or subscribe through
//! [`Cache::observe`] and watch the entry move through the
//! [`cache::CacheResult`] states.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod lock;
pub mod tasks;

pub use cache::{Cache, CacheResult, CacheStats, CacheStatus, Loader, StateStore};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use key::{JsonKeyCodec, KeyCodec};
pub use lock::{KeyGuard, LockManager};
