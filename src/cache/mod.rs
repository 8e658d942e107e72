//! Cache Module
//!
//! The keyed asynchronous cache engine: reactive state store, insertion
//! order tracking, statistics, and the coalescing facade.

mod facade;
mod order;
mod result;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use facade::{Cache, Loader};
pub use order::InsertionOrder;
pub use result::{CacheResult, CacheStatus};
pub use stats::CacheStats;
pub use store::StateStore;
