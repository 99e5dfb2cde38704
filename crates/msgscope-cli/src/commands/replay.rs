use super::{Inspector, SessionArgs, print_messages};
use anyhow::Result;

pub async fn run(target: &SessionArgs) -> Result<()> {
    let inspector = Inspector::open(&target.source).await?;
    let session = target.session();

    let stream = inspector.facade.replay(&session).await?;
    let printed = print_messages(stream).await?;
    tracing::info!(%session, printed, "Replay finished");
    Ok(())
}
