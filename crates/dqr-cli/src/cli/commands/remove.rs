//! `dqr remove <id>` – remove a job by ID.

use anyhow::Result;
use dqr_core::queue::QueueDb;

pub async fn run_remove(db: &QueueDb, id: i64) -> Result<()> {
    match db.get_job(id).await? {
        Some(_) => {
            db.remove_job(id).await?;
            println!("Removed job {id}.");
        }
        None => println!("No job with ID {id}."),
    }
    Ok(())
}
