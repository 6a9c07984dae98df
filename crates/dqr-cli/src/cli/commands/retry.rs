//! `dqr retry` – reset failed jobs for the next run.

use anyhow::Result;
use dqr_core::queue::QueueDb;

pub async fn run_retry(db: &QueueDb) -> Result<()> {
    let n = db.retry_all().await?;
    if n == 0 {
        println!("No failed jobs to retry.");
    } else {
        println!("Reset {n} failed job(s); run `dqr run` to process them.");
    }
    Ok(())
}
