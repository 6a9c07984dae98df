//! `dqr add <source-id> <target> --url <url>` – enqueue a download.

use anyhow::Result;
use dqr_core::queue::{JobSpec, QueueDb};

pub async fn run_add(
    db: &QueueDb,
    source_id: &str,
    target: &str,
    url: &str,
    quality: i64,
    title: Option<String>,
) -> Result<()> {
    let spec = JobSpec {
        source_id: source_id.to_string(),
        target_path: target.to_string(),
        quality,
        title,
        direct_url: Some(url.to_string()),
        ..Default::default()
    };
    let id = db.add_job(&spec).await?;
    println!("Added job {id} for item {source_id} -> {target}");
    Ok(())
}
