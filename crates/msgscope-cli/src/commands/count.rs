use super::{Inspector, SessionArgs};
use anyhow::Result;

pub async fn run(target: &SessionArgs) -> Result<()> {
    let inspector = Inspector::open(&target.source).await?;
    let count = inspector.facade.count(&target.session()).await?;
    println!("{}", count);
    Ok(())
}
