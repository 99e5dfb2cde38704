//! The consumer side of a message stream and the producer handle feeding it.

use crate::transformer::{RecordTransformer, Transformed};
use futures::Stream;
use msgscope_core::error::{Result, ScopeError};
use msgscope_core::msg::Msg;
use msgscope_core::record::LogEntry;
use msgscope_core::session::Session;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One item of a message stream: a message, or the store failure that ended
/// the stream.
pub type MsgResult<P> = Result<Arc<Msg<P>>>;

/// An ordered sequence of messages for one session.
///
/// Backed by a bounded queue filled by a background reader. The reader waits
/// while the queue is full and releases its store read as soon as the stream
/// is dropped or [`close`](Self::close)d. A store error arrives as a final
/// `Err` item, after which the stream ends.
pub struct MsgStream<P> {
    rx: mpsc::Receiver<MsgResult<P>>,
}

impl<P> MsgStream<P> {
    pub(crate) fn new(rx: mpsc::Receiver<MsgResult<P>>) -> Self {
        Self { rx }
    }

    /// A stream that ends without yielding anything.
    pub(crate) fn empty() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self { rx }
    }

    /// Waits for the next item; `None` once the stream has ended.
    pub async fn next_msg(&mut self) -> Option<MsgResult<P>> {
        self.rx.recv().await
    }

    /// Drains a finite stream.
    ///
    /// # Returns
    ///
    /// - `Ok(messages)`: Every message in stream order
    /// - `Err(_)`: The store error that ended the stream
    pub async fn collect_all(mut self) -> Result<Vec<Arc<Msg<P>>>> {
        let mut messages = Vec::new();
        while let Some(item) = self.rx.recv().await {
            messages.push(item?);
        }
        Ok(messages)
    }

    /// Stops the reader. Messages already queued can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<P> Stream for MsgStream<P> {
    type Item = MsgResult<P>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// What the reader should do after handing over a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// The record was the stop sentinel.
    Stopped,
    /// The consumer is gone.
    Closed,
}

/// Producer half: transforms records and queues the resulting messages.
pub(crate) struct Emitter<P> {
    session: Session,
    transformer: Arc<RecordTransformer<P>>,
    tx: mpsc::Sender<MsgResult<P>>,
}

impl<P> Emitter<P>
where
    P: Send + Sync + 'static,
{
    pub(crate) fn new(
        session: Session,
        transformer: Arc<RecordTransformer<P>>,
        tx: mpsc::Sender<MsgResult<P>>,
    ) -> Self {
        Self {
            session,
            transformer,
            tx,
        }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Transforms `entry` and queues the message, waiting for room if the
    /// consumer is behind. Dropped records are skipped silently.
    pub(crate) async fn push(&self, entry: &LogEntry) -> Flow {
        match self.transformer.transform(&self.session, entry) {
            Transformed::Msg(msg) => {
                if self.tx.send(Ok(msg)).await.is_err() {
                    Flow::Closed
                } else {
                    Flow::Continue
                }
            }
            Transformed::Dropped => Flow::Continue,
            Transformed::Stop => Flow::Stopped,
        }
    }

    /// Queues `err` as the stream's last item.
    pub(crate) async fn fail(&self, err: ScopeError) {
        // Nobody to tell if the consumer already left.
        let _ = self.tx.send(Err(err)).await;
    }

    /// Resolves once the consumer has dropped or closed the stream.
    pub(crate) async fn closed(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use msgscope_core::architecture::{Component, Port};
    use msgscope_core::record::RecordId;

    fn msg(n: u64) -> Arc<Msg<u64>> {
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
            payload: Arc::new(n),
            timestamp: n as i64,
            id: RecordId::new(n, 0),
        })
    }

    #[tokio::test]
    async fn test_collect_all_keeps_order() {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for n in 1..=3 {
                tx.send(Ok(msg(n))).await.unwrap();
            }
        });

        let messages = MsgStream::new(rx).collect_all().await.unwrap();
        let payloads: Vec<u64> = messages.iter().map(|m| *m.payload).collect();
        assert_eq!(payloads, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_collect_all_returns_terminal_error() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(msg(1))).await.unwrap();
        tx.send(Err(ScopeError::store("connection reset"))).await.unwrap();
        drop(tx);

        let err = MsgStream::new(rx).collect_all().await.unwrap_err();
        assert!(err.is_store());
    }

    #[tokio::test]
    async fn test_stream_impl_yields_items() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(msg(7))).await.unwrap();
        drop(tx);

        let items: Vec<_> = MsgStream::new(rx).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(*items[0].as_ref().unwrap().payload, 7);
    }

    #[tokio::test]
    async fn test_close_is_seen_by_producer() {
        let (tx, rx) = mpsc::channel::<MsgResult<u64>>(4);
        let mut stream = MsgStream::new(rx);
        stream.close();

        assert!(tx.is_closed());
        assert!(stream.next_msg().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_ends_immediately() {
        let mut stream = MsgStream::<u64>::empty();
        assert!(stream.next_msg().await.is_none());
    }
}
