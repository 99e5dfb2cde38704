use moka::sync::Cache;
use msgscope_core::config::CacheConfig;
use msgscope_core::msg::Msg;
use msgscope_core::record::RecordId;
use msgscope_core::session::Session;
use std::sync::Arc;
use std::time::Duration;

type MessageMap<P> = Cache<RecordId, Arc<Msg<P>>>;

/// Snapshot of the message cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageCacheStats {
    pub sessions: u64,
    pub messages: u64,
}

/// Per-session caches of fully reconstructed messages, keyed by record id.
///
/// A session's cache is created the first time a message of that session is
/// stored and dropped by [`evict`](Self::evict), by idling out, or when more
/// than the configured number of sessions are cached. A successful `put` does
/// not guarantee a later `get` hits: entries may be evicted at any time.
pub struct MessageCaches<P> {
    sessions: Cache<Session, MessageMap<P>>,
    per_session: u64,
    idle: Duration,
}

impl<P> MessageCaches<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(per_session: u64, idle: Duration, max_sessions: u64) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle)
                .build(),
            per_session,
            idle,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.messages_per_session,
            config.message_idle(),
            config.max_sessions,
        )
    }

    /// Looks up a cached message without creating the session's cache.
    pub fn get(&self, session: &Session, id: RecordId) -> Option<Arc<Msg<P>>> {
        self.sessions.get(session)?.get(&id)
    }

    pub fn put(&self, session: &Session, id: RecordId, msg: Arc<Msg<P>>) {
        let per_session = self.per_session;
        let idle = self.idle;
        let messages = self.sessions.get_with(session.clone(), move || {
            Cache::builder()
                .max_capacity(per_session)
                .time_to_idle(idle)
                .build()
        });
        messages.insert(id, msg);
    }

    /// Drops every cached message of `session`.
    pub fn evict(&self, session: &Session) {
        if let Some(messages) = self.sessions.remove(session) {
            messages.invalidate_all();
            tracing::debug!(%session, "Evicted session message cache");
        }
    }

    pub fn stats(&self) -> MessageCacheStats {
        self.sessions.run_pending_tasks();

        let mut stats = MessageCacheStats::default();
        for (_, messages) in self.sessions.iter() {
            messages.run_pending_tasks();
            stats.sessions += 1;
            stats.messages += messages.entry_count();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgscope_core::architecture::{Component, Port};

    fn msg(id: RecordId, payload: &str) -> Arc<Msg<String>> {
        let port = Port {
            id: 0,
            name: "out".to_string(),
            component: 0,
        };
        let bridge = Component {
            id: 0,
            name: "sensor".to_string(),
        };
        Arc::new(Msg {
            src: port.clone(),
            dst: port,
            src_bridge: bridge.clone(),
            dst_bridge: bridge,
            payload: Arc::new(payload.to_string()),
            timestamp: id.timestamp() as i64,
            id,
        })
    }

    fn caches() -> MessageCaches<String> {
        MessageCaches::new(128, Duration::from_secs(60), 16)
    }

    #[test]
    fn test_put_then_get() {
        let caches = caches();
        let session = Session::from(1);
        let id = RecordId::new(1000, 0);

        assert!(caches.get(&session, id).is_none());
        caches.put(&session, id, msg(id, "a"));

        let cached = caches.get(&session, id).unwrap();
        assert_eq!(*cached.payload, "a");
    }

    #[test]
    fn test_sessions_are_partitioned() {
        let caches = caches();
        let id = RecordId::new(1000, 0);
        caches.put(&Session::from(1), id, msg(id, "one"));
        caches.put(&Session::from(2), id, msg(id, "two"));

        assert_eq!(*caches.get(&Session::from(1), id).unwrap().payload, "one");
        assert_eq!(*caches.get(&Session::from(2), id).unwrap().payload, "two");
        assert!(caches.get(&Session::from(3), id).is_none());
    }

    #[test]
    fn test_evict_drops_only_that_session() {
        let caches = caches();
        let id = RecordId::new(1000, 0);
        caches.put(&Session::from(1), id, msg(id, "one"));
        caches.put(&Session::from(2), id, msg(id, "two"));

        caches.evict(&Session::from(1));

        assert!(caches.get(&Session::from(1), id).is_none());
        assert!(caches.get(&Session::from(2), id).is_some());
        assert_eq!(
            caches.stats(),
            MessageCacheStats {
                sessions: 1,
                messages: 1
            }
        );
    }

    #[test]
    fn test_get_does_not_create_session_cache() {
        let caches = caches();
        caches.get(&Session::from(9), RecordId::new(1, 0));
        assert_eq!(caches.stats().sessions, 0);
    }
}
