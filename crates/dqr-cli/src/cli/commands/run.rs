//! `dqr run` – drive the queue until it drains or Ctrl-C pauses it.

use std::sync::Arc;

use anyhow::Result;
use dqr_core::channel::{self, DownloadCommand, WorkerEvent};
use dqr_core::config::DqrConfig;
use dqr_core::connection::{ConnectionManager, WorkerRole};
use dqr_core::forwarder::{EventForwarder, EventSink};
use dqr_core::queue::{worker, JobState, QueueDb};

use super::status::state_name;
use crate::fetch::HttpFetcher;

fn printing_sink() -> Box<dyn EventSink> {
    Box::new(|event: &WorkerEvent| {
        match event {
            WorkerEvent::Progress(entries) => {
                for p in entries {
                    match JobState::from_i64(p.state) {
                        Some(JobState::Downloading) if p.filesize > 0 => {
                            let pct = p.received as f64 / p.filesize as f64 * 100.0;
                            println!(
                                "  job {}: {:.1}% ({} / {} bytes)",
                                p.id, pct, p.received, p.filesize
                            );
                        }
                        Some(state) => println!("  job {}: {}", p.id, state_name(state)),
                        None => {}
                    }
                }
            }
            WorkerEvent::Error(msg) => eprintln!("worker error: {msg}"),
            _ => {}
        }
        Ok(())
    })
}

pub async fn run_queue(db: &QueueDb, cfg: &DqrConfig) -> Result<()> {
    if db.queue_size().await? == 0 {
        println!("No queued jobs.");
        return Ok(());
    }

    let capacity = cfg.queue.mailbox_capacity;
    let fetcher = Arc::new(HttpFetcher::new(&cfg.fetch));
    let (ev_tx, mut ev_rx) = channel::mailbox(capacity);
    let cmd_tx = worker::spawn(db.clone(), fetcher, ev_tx.clone(), capacity);

    let mut mgr = ConnectionManager::new(ev_tx);
    mgr.connect(WorkerRole::Download, cmd_tx).await?;

    let mut forwarder = EventForwarder::new();
    forwarder.attach(printing_sink());

    mgr.send(WorkerRole::Download, DownloadCommand::Start.into_envelope())
        .await?;

    let mut stopping = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !stopping => {
                println!("\nStopping after the current checkpoint...");
                stopping = true;
                mgr.send(WorkerRole::Download, DownloadCommand::Stop.into_envelope())
                    .await?;
            }
            env = ev_rx.recv() => {
                let Some(env) = env else { break };
                match WorkerEvent::from_envelope(&env) {
                    Ok(event) => {
                        forwarder.publish(&event);
                        if matches!(event, WorkerEvent::QueueState { running: false, .. }) {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("undecodable event: {e}"),
                }
            }
        }
    }

    if stopping {
        println!("Paused; `dqr run` resumes where it left off.");
        return Ok(());
    }

    let jobs = db.list_jobs().await?;
    let done = jobs.iter().filter(|j| j.state == JobState::Done).count();
    let failed = jobs.iter().filter(|j| j.state.is_error()).count();
    println!("Run finished: {done} done, {failed} failed.");
    if failed > 0 {
        println!("Use `dqr retry` to queue the failed jobs again.");
    }
    Ok(())
}
