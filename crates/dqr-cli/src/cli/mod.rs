//! CLI for the DQR download queue.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dqr_core::config::{self, DqrConfig};
use dqr_core::queue::QueueDb;

use commands::{run_add, run_clear, run_queue, run_remove, run_retry, run_status};

/// Top-level CLI for the DQR download queue.
#[derive(Debug, Parser)]
#[command(name = "dqr")]
#[command(about = "DQR: persistent download queue with a serial runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Enqueue a download. Re-adding a finished or failed item restarts it.
    Add {
        /// Catalog identifier of the item.
        source_id: String,
        /// Destination file path.
        target: String,
        /// Direct HTTP/HTTPS URL for the item's bytes.
        #[arg(long)]
        url: String,
        /// Quality tier to request.
        #[arg(long, default_value = "3")]
        quality: i64,
        /// Display title.
        #[arg(long)]
        title: Option<String>,
    },

    /// Run the queue until it drains (or Ctrl-C pauses it).
    Run,

    /// Show all jobs in the queue.
    Status,

    /// Remove a job by its ID.
    Remove {
        /// Job identifier.
        id: i64,
    },

    /// Remove every finished or failed job.
    Clear,

    /// Reset failed jobs so the next run picks them up again.
    Retry,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = open_db(&cfg).await?;

        match cli.command {
            CliCommand::Add {
                source_id,
                target,
                url,
                quality,
                title,
            } => run_add(&db, &source_id, &target, &url, quality, title).await?,
            CliCommand::Run => run_queue(&db, &cfg).await?,
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Remove { id } => run_remove(&db, id).await?,
            CliCommand::Clear => run_clear(&db).await?,
            CliCommand::Retry => run_retry(&db).await?,
        }

        Ok(())
    }
}

async fn open_db(cfg: &DqrConfig) -> Result<QueueDb> {
    match &cfg.queue.database_path {
        Some(path) => QueueDb::open_at(path).await,
        None => QueueDb::open_default().await,
    }
}

#[cfg(test)]
mod tests;
