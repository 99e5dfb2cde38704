//! Session Status Tracker.
//!
//! One background task consumes the external status channel, keeps the
//! current status of every session it has heard of, and republishes accepted
//! transitions to any number of local subscribers. Subscribers never touch the
//! external channel themselves.

use futures::stream::{self, BoxStream};
use msgscope_core::config::KeyConfig;
use msgscope_core::error::Result;
use msgscope_core::session::{Session, SessionStatus, StatusUpdate};
use msgscope_core::store::PubSub;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;

type StatusMap = Arc<RwLock<HashMap<Session, SessionStatus>>>;

/// Tracks RUNNING/COMPLETED transitions announced on the status channel.
///
/// Dropping the tracker stops its background task; live subscriptions then
/// end once they have drained what was already published.
pub struct SessionStatusTracker {
    statuses: StatusMap,
    events: broadcast::Sender<StatusUpdate>,
    task: JoinHandle<()>,
}

impl SessionStatusTracker {
    /// Starts tracking the raw tokens arriving on `tokens`.
    ///
    /// `capacity` bounds how many updates a slow subscriber may fall behind
    /// before it starts skipping. Must be called within a Tokio runtime.
    pub fn start(tokens: mpsc::Receiver<String>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let statuses: StatusMap = Arc::new(RwLock::new(HashMap::new()));

        let task = tokio::spawn(run(tokens, Arc::clone(&statuses), events.clone()));
        tracing::info!("Session status tracker started");

        Self {
            statuses,
            events,
            task,
        }
    }

    /// Subscribes to the configured status channel and starts tracking it.
    pub async fn connect(pubsub: &dyn PubSub, keys: &KeyConfig, capacity: usize) -> Result<Self> {
        let tokens = pubsub.subscribe(&keys.status_channel).await?;
        tracing::debug!(channel = %keys.status_channel, "Subscribed to status channel");
        Ok(Self::start(tokens, capacity))
    }

    /// Every accepted transition from now on, for all sessions.
    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.events.subscribe(),
        }
    }

    /// Status changes of one session, starting with its current status if
    /// known. Ends after the session completes.
    pub async fn watch(&self, session: &Session) -> SessionWatch {
        // Subscribe before reading so nothing published in between is lost.
        let updates = self.subscribe();
        let current = self.status(session).await;

        SessionWatch {
            session: session.clone(),
            updates,
            last: None,
            pending: current,
        }
    }

    pub async fn status(&self, session: &Session) -> Option<SessionStatus> {
        self.statuses.read().await.get(session).copied()
    }

    /// Current status of every known session, ordered by session.
    pub async fn snapshot(&self) -> BTreeMap<Session, SessionStatus> {
        self.statuses
            .read()
            .await
            .iter()
            .map(|(session, status)| (session.clone(), *status))
            .collect()
    }

    /// Whether the status channel is still being consumed.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SessionStatusTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut tokens: mpsc::Receiver<String>,
    statuses: StatusMap,
    events: broadcast::Sender<StatusUpdate>,
) {
    while let Some(token) = tokens.recv().await {
        let update = match token.parse::<StatusUpdate>() {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(token = %token, "Skipping status token: {}", e);
                continue;
            }
        };

        let applied = apply(&mut *statuses.write().await, &update);
        if applied {
            tracing::debug!(session = %update.session, status = %update.status, "Session status changed");
            // No subscribers is fine.
            let _ = events.send(update);
        } else {
            tracing::debug!(token = %token, "Ignoring repeated or backward status");
        }
    }

    tracing::info!("Status channel closed, tracker stopped");
}

/// Records `update` if it is a forward transition. Returns whether it was.
fn apply(statuses: &mut HashMap<Session, SessionStatus>, update: &StatusUpdate) -> bool {
    let current = statuses.get(&update.session).copied();
    if !SessionStatus::can_transition(current, update.status) {
        return false;
    }
    statuses.insert(update.session.clone(), update.status);
    true
}

/// A subscriber's view of every accepted status transition.
pub struct StatusSubscription {
    rx: broadcast::Receiver<StatusUpdate>,
}

impl StatusSubscription {
    /// Waits for the next transition; `None` once the tracker is gone.
    ///
    /// A subscriber that fell too far behind skips the updates it missed.
    pub async fn recv(&mut self) -> Option<StatusUpdate> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Status subscriber lagged, skipping missed updates");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, StatusUpdate> {
        Box::pin(stream::unfold(self, |mut sub| async move {
            let update = sub.recv().await?;
            Some((update, sub))
        }))
    }
}

/// Status changes of a single session.
pub struct SessionWatch {
    session: Session,
    updates: StatusSubscription,
    last: Option<SessionStatus>,
    pending: Option<SessionStatus>,
}

impl SessionWatch {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Waits for the session's next status; `None` after `Completed` or once
    /// the tracker is gone.
    pub async fn changed(&mut self) -> Option<SessionStatus> {
        if let Some(status) = self.pending.take() {
            self.last = Some(status);
            return Some(status);
        }
        if self.last == Some(SessionStatus::Completed) {
            return None;
        }

        while let Some(update) = self.updates.recv().await {
            if update.session != self.session {
                continue;
            }
            if SessionStatus::can_transition(self.last, update.status) {
                self.last = Some(update.status);
                return Some(update.status);
            }
        }
        None
    }
}
