//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The loader function failed; the error is also recorded in the entry's
    /// `Failed` state so observers see it without calling `get` themselves.
    #[error("load failed for key {key}: {source}")]
    Load {
        /// Fingerprint of the entry whose load failed
        key: String,
        /// The loader's error, shared with the stored `Failed` state
        source: Arc<anyhow::Error>,
    },

    /// `set_obsolete` targeted an entry that never held a loaded value
    #[error("cannot mark never-loaded entry obsolete: {0}")]
    CannotObsoleteUnloaded(String),

    /// The engine was disposed while the caller was suspended, or the
    /// operation was attempted after disposal
    #[error("cache engine has been disposed")]
    Disposed,

    /// The argument value could not be serialized into a key fingerprint
    #[error("cannot encode cache key: {0}")]
    KeyEncoding(#[from] serde_json::Error),
}

impl CacheError {
    /// True for the error kind the staleness timer treats as an expected
    /// outcome rather than a fault.
    pub fn is_obsolete_precondition(&self) -> bool {
        matches!(self, CacheError::CannotObsoleteUnloaded(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display_includes_key() {
        let err = CacheError::Load {
            key: "[\"user\",42]".to_string(),
            source: Arc::new(anyhow::anyhow!("connection refused")),
        };
        let msg = err.to_string();
        assert!(msg.contains("[\"user\",42]"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_obsolete_precondition_classification() {
        assert!(CacheError::CannotObsoleteUnloaded("k".to_string()).is_obsolete_precondition());
        assert!(!CacheError::Disposed.is_obsolete_precondition());
    }
}
