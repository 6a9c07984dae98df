//! `dqr status` – show all jobs in the queue.

use anyhow::Result;
use dqr_core::queue::{JobState, QueueDb};

pub(crate) fn state_name(state: JobState) -> &'static str {
    match state {
        JobState::None => "queued",
        JobState::Downloading => "downloading",
        JobState::Post => "post",
        JobState::Done => "done",
        JobState::DeezerError => "refused",
        JobState::Error => "failed",
    }
}

pub async fn run_status(db: &QueueDb) -> Result<()> {
    let jobs = db.list_jobs().await?;
    if jobs.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }
    println!("{:<6} {:<12} {:<8} {:<12} {}", "ID", "STATE", "QUALITY", "SOURCE", "TARGET");
    for j in jobs {
        println!(
            "{:<6} {:<12} {:<8} {:<12} {}",
            j.id,
            state_name(j.state),
            j.quality,
            j.source_id,
            j.target_path
        );
    }
    Ok(())
}
