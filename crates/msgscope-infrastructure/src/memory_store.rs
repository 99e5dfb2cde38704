//! In-process store implementing every msgscope store interface.
//!
//! `MemoryStore` keeps append-only streams, plain string values and pub/sub
//! channels in one place, mirroring a single remote server. It backs the CLI
//! and the test suites.

use async_trait::async_trait;
use msgscope_core::error::{Result, ScopeError};
use msgscope_core::record::{LogEntry, RawRecord, RecordId, RecordRange};
use msgscope_core::store::{KeyValueStore, LogStore, PubSub, ReadOrder};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::time::Instant;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// An in-memory log, key/value and pub/sub store.
pub struct MemoryStore {
    streams: RwLock<HashMap<String, Vec<LogEntry>>>,
    values: RwLock<HashMap<String, String>>,
    channels: Mutex<HashMap<String, Vec<mpsc::Sender<String>>>>,
    appended: Notify,
    channel_capacity: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a store whose subscriptions queue at most `capacity` messages.
    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            values: RwLock::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            appended: Notify::new(),
            channel_capacity: capacity.max(1),
        }
    }

    // ============================================================================
    // Streams
    // ============================================================================

    /// Appends `record` to `stream`, assigning the next id from the wall clock.
    ///
    /// Ids never go backwards: if the clock has not advanced past the last id,
    /// the sequence number is bumped instead.
    pub async fn append(&self, stream: &str, record: RawRecord) -> RecordId {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;

        let id = {
            let mut streams = self.streams.write().await;
            let entries = streams.entry(stream.to_string()).or_default();
            let id = next_id(entries.last().map(|e| e.id), now);
            entries.push(LogEntry::new(id, record));
            id
        };

        self.appended.notify_waiters();
        id
    }

    /// Appends `record` under an explicit id, which must be greater than the
    /// stream's last id.
    pub async fn append_with_id(&self, stream: &str, id: RecordId, record: RawRecord) -> Result<()> {
        {
            let mut streams = self.streams.write().await;
            let entries = streams.entry(stream.to_string()).or_default();
            if let Some(last) = entries.last() {
                if id <= last.id {
                    return Err(ScopeError::store(format!(
                        "id {} is not greater than the last id {} of '{}'",
                        id, last.id, stream
                    )));
                }
            }
            entries.push(LogEntry::new(id, record));
        }

        self.appended.notify_waiters();
        Ok(())
    }

    /// Removes a stream entirely. Returns whether it existed.
    pub async fn delete_stream(&self, stream: &str) -> bool {
        self.streams.write().await.remove(stream).is_some()
    }

    async fn entries_after(&self, stream: &str, after: Option<RecordId>, limit: usize) -> Vec<LogEntry> {
        let streams = self.streams.read().await;
        let Some(entries) = streams.get(stream) else {
            return Vec::new();
        };

        let start = entries.partition_point(|e| after.is_some_and(|a| e.id <= a));
        entries[start..].iter().take(limit).cloned().collect()
    }

    // ============================================================================
    // Values
    // ============================================================================

    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().await.insert(key.into(), value.into());
    }

    pub async fn remove(&self, key: &str) -> Option<String> {
        self.values.write().await.remove(key)
    }

    /// Increments the integer stored at `key` (missing counts as 0) and
    /// returns the new value.
    pub async fn incr(&self, key: &str) -> Result<u64> {
        let mut values = self.values.write().await;
        let current = match values.get(key) {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ScopeError::store(format!("value at '{}' is not an integer: {}", key, e))
            })?,
            None => 0,
        };
        let next = current + 1;
        values.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn next_id(last: Option<RecordId>, now: u64) -> RecordId {
    match last {
        Some(last) if now <= last.timestamp() => last.successor().unwrap_or(RecordId::MAX),
        _ => RecordId::new(now, 0),
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn range(
        &self,
        stream: &str,
        range: &RecordRange,
        order: ReadOrder,
        limit: usize,
    ) -> Result<Vec<LogEntry>> {
        let streams = self.streams.read().await;
        let Some(entries) = streams.get(stream) else {
            return Ok(Vec::new());
        };

        let matching = entries.iter().filter(|e| range.contains(&e.id));
        let batch = match order {
            ReadOrder::Ascending => matching.take(limit).cloned().collect(),
            ReadOrder::Descending => matching.rev().take(limit).cloned().collect(),
        };
        Ok(batch)
    }

    async fn read_after(
        &self,
        stream: &str,
        after: Option<RecordId>,
        limit: usize,
        block: Duration,
    ) -> Result<Vec<LogEntry>> {
        let deadline = Instant::now() + block;

        loop {
            // Register interest before looking so an append between the
            // check and the wait is not missed.
            let mut notified = std::pin::pin!(self.appended.notified());
            notified.as_mut().enable();

            let batch = self.entries_after(stream, after, limit).await;
            if !batch.is_empty() {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn size(&self, stream: &str) -> Result<u64> {
        let streams = self.streams.read().await;
        Ok(streams.get(stream).map_or(0, |entries| entries.len() as u64))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if self.values.read().await.contains_key(key) {
            return Ok(true);
        }
        Ok(self.streams.read().await.contains_key(key))
    }
}

#[async_trait]
impl PubSub for MemoryStore {
    async fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        let mut channels = self.channels.lock().await;
        let Some(subscribers) = channels.get_mut(channel) else {
            return Ok(0);
        };

        subscribers.retain(|tx| !tx.is_closed());

        let mut delivered = 0;
        for tx in subscribers.iter() {
            match tx.try_send(message.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(channel, "Subscriber queue full, dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        Ok(delivered)
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.channels
            .lock()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
