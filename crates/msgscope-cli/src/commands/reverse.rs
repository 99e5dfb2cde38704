use super::{Inspector, SessionArgs, print_messages};
use anyhow::Result;
use msgscope_core::record::{RecordBound, RecordId, RecordRange};

pub async fn run(target: &SessionArgs, from: Option<RecordId>, to: Option<RecordId>) -> Result<()> {
    let inspector = Inspector::open(&target.source).await?;
    let range = RecordRange::new(
        from.map_or(RecordBound::Unbounded, RecordBound::Inclusive),
        to.map_or(RecordBound::Unbounded, RecordBound::Inclusive),
    );
    let (start, end) = range.to_store_syntax();
    tracing::debug!(%start, %end, "Reverse range");

    let stream = inspector.messages.reverse_replay(&target.session(), range);
    print_messages(stream).await?;
    Ok(())
}
