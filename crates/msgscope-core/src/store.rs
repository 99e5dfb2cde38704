//! Collaborator interfaces for the external stores.
//!
//! msgscope never talks to a concrete database. It reads session logs through
//! [`LogStore`], session bookkeeping values through [`KeyValueStore`], and
//! status/injection traffic through [`PubSub`]. Transport failures are
//! reported as [`ScopeError::Store`](crate::ScopeError::Store) and are not
//! retried here.

use crate::error::Result;
use crate::record::{LogEntry, RecordId, RecordRange};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Direction of a ranged read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrder {
    Ascending,
    Descending,
}

/// An append-only log per stream key, with ranged reads and tail reads.
///
/// # Implementation Notes
///
/// - Entries within a stream are strictly increasing by [`RecordId`].
/// - `read_after` may suspend up to `block` waiting for new entries and must
///   return an empty batch, not an error, when nothing arrives in time.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Reads at most `limit` entries of `stream` inside `range`, in `order`.
    ///
    /// # Returns
    ///
    /// - `Ok(entries)`: Matching entries; fewer than `limit` means the range
    ///   is exhausted
    /// - `Err(_)`: The store could not be read
    async fn range(
        &self,
        stream: &str,
        range: &RecordRange,
        order: ReadOrder,
        limit: usize,
    ) -> Result<Vec<LogEntry>>;

    /// Reads at most `limit` entries appended after `after` (from the start
    /// of the stream when `None`), waiting up to `block` for at least one.
    async fn read_after(
        &self,
        stream: &str,
        after: Option<RecordId>,
        limit: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>>;

    /// Number of entries currently in `stream` (0 when it does not exist).
    async fn size(&self, stream: &str) -> Result<u64>;
}

/// Plain string values, used for session bookkeeping keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Fire-and-forget string channels.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publishes `message` on `channel`.
    ///
    /// # Returns
    ///
    /// The number of subscribers the message was delivered to.
    async fn publish(&self, channel: &str, message: &str) -> Result<usize>;

    /// Subscribes to `channel`. The receiver closes when the subscription is
    /// lost.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>>;
}
