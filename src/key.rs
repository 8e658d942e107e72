//! Key Codec Module
//!
//! Derives a canonical string fingerprint from a loader's argument value.
//! Two structurally equal argument values always map to the same fingerprint;
//! materially different values practically never collide.

use serde::Serialize;

use crate::error::Result;

// == Key Codec Trait ==
/// Maps an argument value to a canonical fingerprint string.
///
/// Implementations must be pure: no side effects, and stable output for
/// equal input across calls. The fingerprint is order-sensitive and
/// type-sensitive: `("a", 1)` and `(1, "a")` are distinct keys.
pub trait KeyCodec<A>: Send + Sync {
    /// Encodes the argument value into its fingerprint.
    ///
    /// Fails loudly when the value cannot be encoded; distinct arguments are
    /// never silently coalesced into the same key.
    fn encode(&self, args: &A) -> Result<String>;
}

// == JSON Key Codec ==
/// Default codec: structural serialization via `serde_json`.
///
/// The `Serialize` bound statically rules out functions and other non-data
/// arguments; values serde cannot represent (e.g. maps with non-string keys)
/// surface as [`crate::CacheError::KeyEncoding`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonKeyCodec;

impl<A: Serialize> KeyCodec<A> for JsonKeyCodec {
    fn encode(&self, args: &A) -> Result<String> {
        Ok(serde_json::to_string(args)?)
    }
}
