//! Loading JSON-lines log dumps into an in-memory store.
//!
//! Each line holds one record of one session:
//!
//! ```text
//! {"session":"1","id":"1700000000000-0","record":{"timestamp":"1700000000000","src":"0","dst":"1","data":"42"}}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Session bookkeeping
//! (counter, start and stop times) is derived from the records so the session
//! directory works on a dump the same way it does on a live store.

use anyhow::{Context, Result};
use msgscope_core::keys;
use msgscope_core::record::{FIELD_TIMESTAMP, RawRecord, RecordId};
use msgscope_core::session::Session;
use msgscope_core::store::KeyValueStore;
use msgscope_infrastructure::MemoryStore;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct DumpLine {
    session: Session,
    id: RecordId,
    record: RawRecord,
}

/// Reads a dump file into `store`, remembering how far it got.
pub struct DumpLoader {
    path: PathBuf,
    store: Arc<MemoryStore>,
    lines_read: usize,
    highest_session: u64,
}

impl DumpLoader {
    pub fn new(path: &Path, store: Arc<MemoryStore>) -> Self {
        Self {
            path: path.to_path_buf(),
            store,
            lines_read: 0,
            highest_session: 0,
        }
    }

    /// Loads every line not loaded yet. Returns how many records were added.
    pub async fn load_new(&mut self) -> Result<usize> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read log dump {}", self.path.display()))?;

        let mut added = 0;
        let lines: Vec<&str> = content.lines().collect();
        // The last line may still be in the middle of being written.
        let complete = if content.ends_with('\n') {
            lines.len()
        } else {
            lines.len().saturating_sub(1)
        };

        for (index, line) in lines.iter().enumerate().take(complete).skip(self.lines_read) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed: DumpLine = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid dump line", self.path.display(), index + 1))?;
            self.add(parsed)
                .await
                .with_context(|| format!("{}:{}", self.path.display(), index + 1))?;
            added += 1;
        }
        self.lines_read = self.lines_read.max(complete);

        tracing::debug!(path = %self.path.display(), added, "Loaded log dump");
        Ok(added)
    }

    /// Keeps loading lines appended to the dump every `interval`.
    pub fn follow(mut self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.load_new().await {
                    tracing::error!("Stopped following log dump: {:#}", e);
                    break;
                }
            }
        })
    }

    async fn add(&mut self, line: DumpLine) -> Result<()> {
        let DumpLine {
            session,
            id,
            record,
        } = line;

        let timestamp = record.get(FIELD_TIMESTAMP).map(str::to_string);
        let is_stop = record.is_stop();

        self.store
            .append_with_id(&keys::stream_key(&session), id, record)
            .await?;

        if let Some(timestamp) = timestamp {
            let start_key = keys::start_key(&session);
            if self.store.get(&start_key).await?.is_none() {
                self.store.set(start_key, timestamp.clone()).await;
            }
            if is_stop {
                self.store.set(keys::stop_key(&session), timestamp).await;
            }
        }

        if let Ok(number) = session.name().parse::<u64>() {
            if number > self.highest_session {
                self.highest_session = number;
                self.store
                    .set(keys::SESSION_COUNTER, number.to_string())
                    .await;
            }
        }
        Ok(())
    }
}
