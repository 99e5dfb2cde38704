use super::{Inspector, SourceArgs};
use anyhow::Result;

pub async fn run(source: &SourceArgs) -> Result<()> {
    let inspector = Inspector::open(source).await?;
    let directory = &inspector.sessions;

    for session in directory.sessions().await? {
        let status = directory
            .status_of(&session)
            .await?
            .map_or_else(|| "UNKNOWN".to_string(), |s| s.to_string());
        let start = directory.start_time_of(&session).await?;
        let stop = directory.stop_time_of(&session).await?;
        let count = inspector.messages.count(&session).await?;

        println!(
            "{}\t{}\t{}\t{}\t{}",
            session,
            status,
            start.map_or_else(|| "-".to_string(), |t| t.to_string()),
            stop.map_or_else(|| "-".to_string(), |t| t.to_string()),
            count
        );
    }
    Ok(())
}
