//! Caches that keep repeated and concurrent reads from redoing work.
//!
//! - `payload_cache`: process-wide, content-addressed decoded payloads
//! - `message_cache`: per-session reconstructed messages by record id

mod message_cache;
mod payload_cache;

pub use message_cache::{MessageCacheStats, MessageCaches};
pub use payload_cache::{PayloadCache, Weigher, approx_string_weight};
