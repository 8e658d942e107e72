//! Cache Result Module
//!
//! The tagged union describing what an entry currently holds. Exactly one
//! variant is active per entry at any time; transitions go through the
//! state store only.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Cache Status ==
/// Discriminant of [`CacheResult`], convenient for comparisons and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Uninitialized,
    Loading,
    Loaded,
    Obsolete,
    Failed,
}

// == Cache Result ==
/// Current state of a single cache entry.
///
/// A value once obtained from a successful load is never silently discarded
/// on failure: `Failed` may retain the last good value for fallback display.
/// Status drives correctness decisions, not value presence: a `Failed`
/// entry is not usable data even when it still carries a value, which is why
/// [`CacheResult::value`] and [`CacheResult::display_value`] are separate.
#[derive(Debug, Clone)]
pub enum CacheResult<V> {
    /// Entry observed but never loaded
    Uninitialized,
    /// A load is in flight; no value available yet
    Loading { updated_at: DateTime<Utc> },
    /// Most recent successful load, considered fresh
    Loaded { value: V, updated_at: DateTime<Utc> },
    /// Previous successful value retained but flagged stale; the next `get`
    /// performs a real load
    Obsolete { value: V, updated_at: DateTime<Utc> },
    /// Most recent load attempt failed; `value` is the last good value if
    /// one was ever loaded
    Failed {
        error: Arc<anyhow::Error>,
        value: Option<V>,
        updated_at: DateTime<Utc>,
    },
}

impl<V> CacheResult<V> {
    // == Status ==
    /// The active variant's discriminant.
    pub fn status(&self) -> CacheStatus {
        match self {
            CacheResult::Uninitialized => CacheStatus::Uninitialized,
            CacheResult::Loading { .. } => CacheStatus::Loading,
            CacheResult::Loaded { .. } => CacheStatus::Loaded,
            CacheResult::Obsolete { .. } => CacheStatus::Obsolete,
            CacheResult::Failed { .. } => CacheStatus::Failed,
        }
    }

    // == Value ==
    /// The usable value: present only for `Loaded` and `Obsolete`.
    ///
    /// A `Failed` entry answers `None` here even when it retains a remnant;
    /// errors take priority over retained values for correctness decisions.
    pub fn value(&self) -> Option<&V> {
        match self {
            CacheResult::Loaded { value, .. } | CacheResult::Obsolete { value, .. } => Some(value),
            _ => None,
        }
    }

    // == Display Value ==
    /// The value to show a user, including the remnant a `Failed` entry
    /// retains from its last successful load.
    pub fn display_value(&self) -> Option<&V> {
        match self {
            CacheResult::Loaded { value, .. } | CacheResult::Obsolete { value, .. } => Some(value),
            CacheResult::Failed { value, .. } => value.as_ref(),
            _ => None,
        }
    }

    // == Error ==
    /// The load error, if the entry is `Failed`.
    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            CacheResult::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    // == Updated At ==
    /// Timestamp of the most recent transition, if any has occurred.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            CacheResult::Uninitialized => None,
            CacheResult::Loading { updated_at }
            | CacheResult::Loaded { updated_at, .. }
            | CacheResult::Obsolete { updated_at, .. }
            | CacheResult::Failed { updated_at, .. } => Some(*updated_at),
        }
    }

    /// True when the entry holds a fresh, trusted value.
    pub fn is_loaded(&self) -> bool {
        matches!(self, CacheResult::Loaded { .. })
    }
}
