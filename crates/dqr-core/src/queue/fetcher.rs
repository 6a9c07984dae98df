//! Fetch collaborator seam.
//!
//! The queue runner never touches the network itself; it hands the claimed
//! job to a [`Fetcher`] on a blocking task, together with a progress sink and
//! a cooperative abort token.

use std::sync::atomic::AtomicBool;

use tokio::sync::mpsc;

use super::job::{Job, JobId};

/// Terminal outcome of one transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Transfer complete, bytes on disk at the target path.
    Done,
    /// The abort token was observed at a checkpoint; nothing terminal was
    /// decided about the job.
    Aborted,
    /// Recoverable failure (network, disk). Recorded as `Error`.
    Failed(String),
    /// The remote service refused the item (auth/rights). Recorded as
    /// `DeezerError`.
    ServiceDenied(String),
}

/// One incremental progress report from a fetch in flight.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub id: JobId,
    pub received: u64,
    pub filesize: u64,
}

/// Handed to the fetcher; bound to one job. Reports are best-effort: if the
/// runner is momentarily behind, a sample is dropped rather than stalling
/// the transfer.
pub struct ProgressSink {
    job_id: JobId,
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ProgressSink {
    pub(crate) fn new(job_id: JobId, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { job_id, tx }
    }

    pub fn report(&self, received: u64, filesize: u64) {
        let _ = self.tx.try_send(ProgressUpdate {
            id: self.job_id,
            received,
            filesize,
        });
    }
}

/// The byte-transfer collaborator. `fetch` blocks and is run on a blocking
/// task by the worker; implementations must observe `abort` at safe
/// checkpoints (never mid-write) and return [`FetchOutcome::Aborted`].
pub trait Fetcher: Send + Sync + 'static {
    /// Opaque settings pushed by the controller (`UpdateSettings`).
    fn update_settings(&self, _settings: &serde_json::Value) {}

    fn fetch(&self, job: &Job, progress: &ProgressSink, abort: &AtomicBool) -> FetchOutcome;
}
