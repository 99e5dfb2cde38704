//! Session-level message access with the configured timestamp convention.

use crate::msg_service::MessageStreamService;
use crate::session_service::SessionService;
use crate::stream::{MsgResult, MsgStream};
use futures::StreamExt;
use futures::stream::BoxStream;
use msgscope_core::config::TimestampMode;
use msgscope_core::error::Result;
use msgscope_core::record::RecordRange;
use msgscope_core::session::Session;
use std::sync::Arc;

/// Whole-session streams, parameterised only by session.
///
/// With [`TimestampMode::SessionRelative`] every message's timestamp is
/// shifted by the session's recorded start time on the way out; the shared
/// caches keep holding absolute messages.
pub struct SessionMessages<P> {
    messages: Arc<MessageStreamService<P>>,
    sessions: Arc<SessionService>,
    timestamps: TimestampMode,
}

impl<P> SessionMessages<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(
        messages: Arc<MessageStreamService<P>>,
        sessions: Arc<SessionService>,
        timestamps: TimestampMode,
    ) -> Self {
        Self {
            messages,
            sessions,
            timestamps,
        }
    }

    /// Every message of the session from the beginning, then new ones as
    /// they are appended, until the session stops.
    pub async fn live(&self, session: &Session) -> Result<BoxStream<'static, MsgResult<P>>> {
        let offset = self.offset(session).await?;
        Ok(project(self.messages.live(session, RecordRange::all()), offset))
    }

    /// The messages already recorded for the session.
    pub async fn replay(&self, session: &Session) -> Result<BoxStream<'static, MsgResult<P>>> {
        let offset = self.offset(session).await?;
        Ok(project(self.messages.replay(session, RecordRange::all()), offset))
    }

    pub async fn count(&self, session: &Session) -> Result<u64> {
        self.messages.count(session).await
    }

    pub fn timestamps(&self) -> TimestampMode {
        self.timestamps
    }

    async fn offset(&self, session: &Session) -> Result<Option<i64>> {
        if self.timestamps == TimestampMode::Absolute {
            return Ok(None);
        }

        match self.sessions.start_time_of(session).await? {
            Some(start) => Ok(Some(start)),
            None => {
                tracing::warn!(%session, "No start time recorded, timestamps left unshifted");
                Ok(Some(0))
            }
        }
    }
}

fn project<P>(stream: MsgStream<P>, offset: Option<i64>) -> BoxStream<'static, MsgResult<P>>
where
    P: Send + Sync + 'static,
{
    match offset {
        None => stream.boxed(),
        Some(start) => stream
            .map(move |item| item.map(|msg| Arc::new(msg.relative_to(start))))
            .boxed(),
    }
}
