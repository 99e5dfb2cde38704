//! Session directory: which sessions exist and when they ran.

use crate::status_tracker::{SessionStatusTracker, StatusSubscription};
use futures::{StreamExt, TryStreamExt, stream};
use msgscope_core::config::KeyConfig;
use msgscope_core::error::{Result, ScopeError};
use msgscope_core::keys;
use msgscope_core::session::{Session, SessionStatus};
use msgscope_core::store::KeyValueStore;
use std::sync::Arc;

/// Upper bound on existence checks issued at once.
const EXISTS_CHUNK: u64 = 65_536;

/// Reads session bookkeeping kept by the instrumented system.
///
/// Session numbers are handed out from a counter; a session exists when its
/// log stream does. Start and stop times are epoch milliseconds stored as
/// decimal strings.
pub struct SessionService {
    kv: Arc<dyn KeyValueStore>,
    keys: KeyConfig,
    tracker: Option<Arc<SessionStatusTracker>>,
}

impl SessionService {
    pub fn new(kv: Arc<dyn KeyValueStore>, keys: KeyConfig) -> Self {
        Self {
            kv,
            keys,
            tracker: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<SessionStatusTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// All sessions that still have a log, in ascending session number.
    ///
    /// # Returns
    ///
    /// - `Ok(sessions)`: Empty if no session counter has been written
    /// - `Err(ScopeError::Store)`: The counter is not a number, or a lookup failed
    pub async fn sessions(&self) -> Result<Vec<Session>> {
        let Some(raw) = self.kv.get(&self.keys.session_counter).await? else {
            return Ok(Vec::new());
        };
        let count: u64 = raw.trim().parse().map_err(|_| {
            ScopeError::store(format!(
                "session counter '{}' is not a number: '{}'",
                self.keys.session_counter, raw
            ))
        })?;

        let concurrency = count.clamp(1, EXISTS_CHUNK) as usize;
        let found: Vec<Option<Session>> = stream::iter(1..=count)
            .map(|number| {
                let session = Session::from(number);
                async move {
                    let exists = self.kv.exists(&keys::stream_key(&session)).await?;
                    Ok::<_, ScopeError>(exists.then_some(session))
                }
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let sessions: Vec<Session> = found.into_iter().flatten().collect();
        tracing::debug!(count, existing = sessions.len(), "Listed sessions");
        Ok(sessions)
    }

    pub async fn start_time_of(&self, session: &Session) -> Result<Option<i64>> {
        self.millis(&keys::start_key(session)).await
    }

    pub async fn stop_time_of(&self, session: &Session) -> Result<Option<i64>> {
        self.millis(&keys::stop_key(session)).await
    }

    /// Status derived from the recorded start and stop times.
    pub async fn status_of(&self, session: &Session) -> Result<Option<SessionStatus>> {
        if self.kv.exists(&keys::stop_key(session)).await? {
            return Ok(Some(SessionStatus::Completed));
        }
        if self.kv.exists(&keys::start_key(session)).await? {
            return Ok(Some(SessionStatus::Running));
        }
        Ok(None)
    }

    /// Live status transitions, if a tracker is attached.
    pub fn live_status_updates(&self) -> Option<StatusSubscription> {
        self.tracker.as_ref().map(|tracker| tracker.subscribe())
    }

    async fn millis(&self, key: &str) -> Result<Option<i64>> {
        match self.kv.get(key).await? {
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                ScopeError::store(format!("value at '{}' is not a timestamp: '{}'", key, raw))
            }),
            None => Ok(None),
        }
    }
}
