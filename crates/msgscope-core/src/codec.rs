//! Payload codec seam.

use crate::error::Result;

/// Converts the application-specific payload type to and from the string
/// stored in a record's `data` field.
///
/// Failures are reported as [`ScopeError::Codec`](crate::ScopeError::Codec).
pub trait PayloadCodec<P>: Send + Sync {
    fn serialize(&self, payload: &P) -> Result<String>;

    fn deserialize(&self, raw: &str) -> Result<P>;
}
