use super::{Inspector, SessionArgs, print_messages};
use anyhow::Result;
use futures::stream;
use msgscope_application::MessageStreamService;
use msgscope_core::msg::Msg;
use msgscope_core::record::RecordRange;
use msgscope_core::session::Session;
use serde_json::Value;
use std::sync::Arc;

/// Prints the last `lines` messages, then with `follow` keeps printing new
/// ones until the session stops or the process is interrupted.
pub async fn run(target: &SessionArgs, lines: usize, follow: bool) -> Result<()> {
    let Inspector {
        config,
        messages,
        loader,
        ..
    } = Inspector::open(&target.source).await?;
    let session = target.session();

    let mut newest_first = newest_messages(&messages, &session, lines).await?;
    let newest = newest_first.first().map(|msg| msg.id);
    newest_first.reverse();
    print_messages(stream::iter(newest_first.into_iter().map(Ok))).await?;

    if !follow {
        return Ok(());
    }

    let _follower = loader.follow(config.stream.poll_timeout());
    let range = match newest {
        Some(id) => RecordRange::all().after(id),
        None => RecordRange::all(),
    };
    tracing::info!(%session, "Following");
    print_messages(messages.live(&session, range)).await?;
    Ok(())
}

/// Reads up to `lines` of the session's latest messages, newest first.
async fn newest_messages(
    messages: &MessageStreamService<Value>,
    session: &Session,
    lines: usize,
) -> Result<Vec<Arc<Msg<Value>>>> {
    let mut newest_first = Vec::with_capacity(lines.min(1024));
    if lines == 0 {
        return Ok(newest_first);
    }
    let mut reverse = messages.reverse_replay(session, RecordRange::all());
    while let Some(item) = reverse.next_msg().await {
        newest_first.push(item?);
        if newest_first.len() == lines {
            break;
        }
    }
    Ok(newest_first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgscope_core::config::ScopeConfig;
    use msgscope_core::record::RawRecord;
    use msgscope_infrastructure::{JsonCodec, MemoryStore, StaticArchitecture};

    async fn service() -> MessageStreamService<Value> {
        let store = Arc::new(MemoryStore::new());
        for n in 0..3 {
            let record = RawRecord::new()
                .with("timestamp", (1000 + n).to_string())
                .with("src", "0")
                .with("dst", "0")
                .with("data", n.to_string());
            store.append("1-stream", record).await;
        }
        let architecture = StaticArchitecture::new()
            .with_component(0, "loopback", &[(0, "io")])
            .unwrap();
        MessageStreamService::new(
            store,
            Arc::new(architecture),
            Arc::new(JsonCodec::new()),
            &ScopeConfig::default(),
        )
    }

    fn payloads(messages: &[Arc<Msg<Value>>]) -> Vec<Value> {
        messages.iter().map(|msg| (*msg.payload).clone()).collect()
    }

    #[tokio::test]
    async fn test_newest_messages_takes_latest_first() {
        let service = service().await;
        let newest = newest_messages(&service, &Session::from(1), 2).await.unwrap();
        assert_eq!(payloads(&newest), vec![Value::from(2), Value::from(1)]);
        assert!(newest_messages(&service, &Session::from(1), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_huge_line_count_reads_whole_session() {
        let service = service().await;
        let newest = newest_messages(&service, &Session::from(1), usize::MAX)
            .await
            .unwrap();
        assert_eq!(newest.len(), 3);
    }
}
