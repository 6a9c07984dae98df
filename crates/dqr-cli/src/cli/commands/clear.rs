//! `dqr clear` – remove every finished or failed job.

use anyhow::Result;
use dqr_core::queue::{JobState, QueueDb};

pub async fn run_clear(db: &QueueDb) -> Result<()> {
    let n = db.remove_by_state(JobState::Done, None).await?;
    if n == 0 {
        println!("Nothing to clear.");
    } else {
        println!("Cleared {n} job(s).");
    }
    Ok(())
}
