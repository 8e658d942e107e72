//! Configuration Module
//!
//! Cache tuning parameters, settable directly or loaded from environment
//! variables.

use std::env;
use std::time::Duration;

/// Cache tuning parameters.
///
/// All fields are optional; an omitted field disables the corresponding
/// behavior entirely.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Maximum number of resident entries; the oldest entry (by insertion
    /// order) is evicted when a new key would exceed this bound
    pub capacity: Option<usize>,
    /// Delay after a successful load before the entry is marked obsolete
    pub stale_after: Option<Duration>,
    /// Delay after a successful load before the entry is removed outright
    pub evict_after: Option<Duration>,
}

impl CacheConfig {
    /// Creates a CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum resident entries (default: unbounded)
    /// - `CACHE_STALE_MS` - Staleness delay in milliseconds (default: none)
    /// - `CACHE_TIME_MS` - Expiry delay in milliseconds (default: none)
    pub fn from_env() -> Self {
        Self {
            capacity: env::var("CACHE_CAPACITY").ok().and_then(|v| v.parse().ok()),
            stale_after: env::var("CACHE_STALE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
            evict_after: env::var("CACHE_TIME_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
        }
    }
}
