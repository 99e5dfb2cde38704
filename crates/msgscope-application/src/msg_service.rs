//! Message Stream Service: ordered message streams over a session's log.
//!
//! Every operation opens its own read position against the log store and
//! runs it on a background task that feeds a bounded [`MsgStream`]. Records
//! pass through the shared [`RecordTransformer`], so concurrent readers of
//! the same session reuse each other's decoded payloads and messages.

use crate::cache::{MessageCaches, PayloadCache};
use crate::stream::{Emitter, Flow, MsgStream};
use crate::transformer::RecordTransformer;
use msgscope_core::architecture::ArchitectureLookup;
use msgscope_core::codec::PayloadCodec;
use msgscope_core::config::{ScopeConfig, StreamConfig};
use msgscope_core::error::Result;
use msgscope_core::keys;
use msgscope_core::record::{RecordBound, RecordId, RecordRange};
use msgscope_core::session::Session;
use msgscope_core::store::{LogStore, ReadOrder};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Serves live, replayed and reversed message streams for sessions.
///
/// Timestamps are emitted as recorded (absolute epoch milliseconds). The
/// stream-producing methods spawn onto the current Tokio runtime and must be
/// called from within one.
pub struct MessageStreamService<P> {
    store: Arc<dyn LogStore>,
    transformer: Arc<RecordTransformer<P>>,
    payloads: Arc<PayloadCache<P>>,
    messages: Arc<MessageCaches<P>>,
    config: StreamConfig,
}

impl<P> MessageStreamService<P>
where
    P: Send + Sync + 'static,
{
    /// Creates a service with caches sized from `config`.
    pub fn new(
        store: Arc<dyn LogStore>,
        architecture: Arc<dyn ArchitectureLookup>,
        codec: Arc<dyn PayloadCodec<P>>,
        config: &ScopeConfig,
    ) -> Self {
        Self::with_caches(
            store,
            architecture,
            codec,
            Arc::new(PayloadCache::from_config(&config.cache)),
            Arc::new(MessageCaches::from_config(&config.cache)),
            config.stream.clone(),
        )
    }

    /// Creates a service around existing caches, e.g. a payload cache shared
    /// with another service.
    pub fn with_caches(
        store: Arc<dyn LogStore>,
        architecture: Arc<dyn ArchitectureLookup>,
        codec: Arc<dyn PayloadCodec<P>>,
        payloads: Arc<PayloadCache<P>>,
        messages: Arc<MessageCaches<P>>,
        config: StreamConfig,
    ) -> Self {
        let transformer = Arc::new(RecordTransformer::new(
            architecture,
            codec,
            Arc::clone(&payloads),
            Arc::clone(&messages),
        ));
        Self {
            store,
            transformer,
            payloads,
            messages,
            config,
        }
    }

    /// Tails the session's log starting at the lower bound of `range`.
    ///
    /// An unbounded lower bound starts at the beginning of the log. The
    /// stream waits for new records and ends at the stop sentinel, once a
    /// record beyond a bounded upper end appears, or when the consumer goes
    /// away.
    pub fn live(&self, session: &Session, range: RecordRange) -> MsgStream<P> {
        let after = start_after(&range.lower);
        self.spawn(session, "live", move |reader| async move {
            reader.tail(after, &range).await
        })
    }

    /// Tails only records appended after this call returns.
    ///
    /// A session whose newest record is the stop sentinel yields an empty
    /// stream.
    pub async fn live_from_now(&self, session: &Session) -> Result<MsgStream<P>> {
        let key = keys::stream_key(session);
        let newest = self
            .store
            .range(&key, &RecordRange::all(), ReadOrder::Descending, 1)
            .await?;

        let after = match newest.first() {
            Some(entry) if entry.record.is_stop() => {
                tracing::debug!(%session, "Session already stopped, nothing to tail");
                return Ok(MsgStream::empty());
            }
            Some(entry) => Some(entry.id),
            None => None,
        };

        Ok(self.spawn(session, "live_from_now", move |reader| async move {
            reader.tail(after, &RecordRange::all()).await
        }))
    }

    /// Replays the records of `range` that are already in the log, oldest
    /// first, ending at the end of the data or at the stop sentinel.
    pub fn replay(&self, session: &Session, range: RecordRange) -> MsgStream<P> {
        self.spawn(session, "replay", move |reader| async move {
            reader.scan(&range, ReadOrder::Ascending).await.map(|_| ())
        })
    }

    /// Replays `range` and then keeps tailing from where the replay ended.
    ///
    /// The tail resumes after the last record the replay read, dropped
    /// records included, so the splice neither skips nor repeats a record.
    pub fn replay_then_live(&self, session: &Session, range: RecordRange) -> MsgStream<P> {
        self.spawn(session, "replay_then_live", move |reader| async move {
            let after = match reader.scan(&range, ReadOrder::Ascending).await? {
                Scan::Ended => return Ok(()),
                Scan::Exhausted(Some(last)) => Some(last),
                Scan::Exhausted(None) => start_after(&range.lower),
            };
            tracing::debug!(after = ?after.map(|id| id.to_string()), "Replay done, tailing");
            reader.tail(after, &range).await
        })
    }

    /// Replays the durable records of `range`, newest first.
    ///
    /// The stop sentinel is skipped rather than ending the stream, so a
    /// completed session replays in full.
    pub fn reverse_replay(&self, session: &Session, range: RecordRange) -> MsgStream<P> {
        self.spawn(session, "reverse_replay", move |reader| async move {
            reader.scan(&range, ReadOrder::Descending).await.map(|_| ())
        })
    }

    /// Number of records currently in the session's log, sentinel included.
    pub async fn count(&self, session: &Session) -> Result<u64> {
        self.store.size(&keys::stream_key(session)).await
    }

    /// Releases every cached message of `session`.
    pub fn evict_session(&self, session: &Session) {
        self.messages.evict(session);
    }

    pub fn payload_cache(&self) -> &Arc<PayloadCache<P>> {
        &self.payloads
    }

    pub fn message_caches(&self) -> &Arc<MessageCaches<P>> {
        &self.messages
    }

    pub fn transformer(&self) -> &Arc<RecordTransformer<P>> {
        &self.transformer
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn spawn<F, Fut>(&self, session: &Session, mode: &'static str, run: F) -> MsgStream<P>
    where
        F: FnOnce(Arc<Reader<P>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.buffer.max(1));
        let reader = Arc::new(Reader {
            store: Arc::clone(&self.store),
            key: keys::stream_key(session),
            page_size: self.config.page_size.max(1),
            poll_timeout: self.config.poll_timeout(),
            emitter: Emitter::new(session.clone(), Arc::clone(&self.transformer), tx),
        });

        let span = tracing::debug_span!("msg_stream", session = %session, mode);
        tokio::spawn(
            async move {
                tracing::debug!("Stream opened");
                if let Err(e) = run(Arc::clone(&reader)).await {
                    tracing::warn!(session = %reader.emitter.session(), "Stream failed: {}", e);
                    reader.emitter.fail(e).await;
                }
                tracing::debug!("Stream closed");
            }
            .instrument(span),
        );

        MsgStream::new(rx)
    }
}

/// The id a tail read should start after to honour a lower bound.
fn start_after(lower: &RecordBound) -> Option<RecordId> {
    match *lower {
        RecordBound::Unbounded => None,
        RecordBound::Exclusive(id) => Some(id),
        RecordBound::Inclusive(id) => id.predecessor(),
    }
}

/// How a ranged scan finished.
enum Scan {
    /// All matching records were read; carries the last id read.
    Exhausted(Option<RecordId>),
    /// The sentinel was reached or the consumer left.
    Ended,
}

/// One stream's read position against the store.
struct Reader<P> {
    store: Arc<dyn LogStore>,
    key: String,
    page_size: usize,
    poll_timeout: Duration,
    emitter: Emitter<P>,
}

impl<P> Reader<P>
where
    P: Send + Sync + 'static,
{
    /// Reads `range` page by page in `order`, narrowing the window past the
    /// last id of each full page.
    async fn scan(&self, range: &RecordRange, order: ReadOrder) -> Result<Scan> {
        let mut window = *range;
        let mut last = None;

        loop {
            let page = tokio::select! {
                page = self.store.range(&self.key, &window, order, self.page_size) => page?,
                _ = self.emitter.closed() => return Ok(Scan::Ended),
            };

            for entry in &page {
                last = Some(entry.id);
                match self.emitter.push(entry).await {
                    Flow::Continue => {}
                    Flow::Stopped if order == ReadOrder::Descending => {}
                    Flow::Stopped | Flow::Closed => return Ok(Scan::Ended),
                }
            }

            match last {
                Some(id) if page.len() == self.page_size => {
                    window = match order {
                        ReadOrder::Ascending => window.after(id),
                        ReadOrder::Descending => window.before(id),
                    };
                }
                _ => return Ok(Scan::Exhausted(last)),
            }
        }
    }

    /// Follows the log after `after` until the sentinel, the end of `range`,
    /// or the consumer leaving.
    async fn tail(&self, mut after: Option<RecordId>, range: &RecordRange) -> Result<()> {
        if upper_reached(after, range) {
            return Ok(());
        }
        loop {
            let batch = tokio::select! {
                batch = self.store.read_after(&self.key, after, self.page_size, self.poll_timeout) => batch?,
                _ = self.emitter.closed() => return Ok(()),
            };

            for entry in &batch {
                if !range.contains(&entry.id) {
                    return Ok(());
                }
                after = Some(entry.id);
                match self.emitter.push(entry).await {
                    Flow::Continue => {}
                    Flow::Stopped | Flow::Closed => return Ok(()),
                }
                if upper_reached(after, range) {
                    return Ok(());
                }
            }
        }
    }
}

/// Whether nothing after `after` can still fall inside `range`.
fn upper_reached(after: Option<RecordId>, range: &RecordRange) -> bool {
    match (after, range.upper) {
        (Some(after), RecordBound::Inclusive(upper)) => after >= upper,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_after_lower_bound() {
        let id = RecordId::new(1000, 3);
        assert_eq!(start_after(&RecordBound::Unbounded), None);
        assert_eq!(start_after(&RecordBound::Exclusive(id)), Some(id));
        assert_eq!(
            start_after(&RecordBound::Inclusive(id)),
            Some(RecordId::new(1000, 2))
        );
        assert_eq!(start_after(&RecordBound::Inclusive(RecordId::MIN)), None);
    }

    #[test]
    fn test_upper_reached_only_for_inclusive_bound() {
        let upper = RecordId::new(1000, 2);
        let inclusive = RecordRange::from_bounds(..=upper);
        assert!(!upper_reached(None, &inclusive));
        assert!(!upper_reached(Some(RecordId::new(1000, 1)), &inclusive));
        assert!(upper_reached(Some(upper), &inclusive));
        assert!(upper_reached(Some(RecordId::new(1001, 0)), &inclusive));
        assert!(!upper_reached(Some(upper), &RecordRange::all()));
    }
}
