//! Serial download-queue runner.
//!
//! One tokio task owns the queue state machine: commands arrive serialized
//! through the worker mailbox, at most one fetch is in flight, and every
//! mutating command is answered with a `QueueState` broadcast so the
//! controller never has to poll. Cancellation is cooperative: stop/remove
//! raise an abort token the fetcher observes at its next safe checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::{mailbox, CommandSender, DownloadCommand, Envelope, EventSender, WorkerEvent};

use super::db::QueueDb;
use super::fetcher::{FetchOutcome, Fetcher, ProgressSink, ProgressUpdate};
use super::job::{Job, JobId, JobState, ProgressEntry};

/// Spawn the download worker task. Returns its command mailbox; events flow
/// to `events` (best-effort, dropped if the controller is away).
pub fn spawn(
    db: QueueDb,
    fetcher: Arc<dyn Fetcher>,
    events: EventSender,
    mailbox_capacity: usize,
) -> CommandSender {
    let (cmd_tx, cmd_rx) = mailbox(mailbox_capacity);
    let (progress_tx, progress_rx) = mpsc::channel(mailbox_capacity.max(1));
    let runner = Runner {
        db,
        fetcher,
        events,
        progress_tx,
        running: false,
        active: None,
    };
    tokio::spawn(runner.run(cmd_rx, progress_rx));
    cmd_tx
}

/// The fetch currently in flight.
struct ActiveFetch {
    id: JobId,
    quality: i64,
    abort: Arc<AtomicBool>,
    handle: JoinHandle<FetchOutcome>,
    /// Set when the job was removed while downloading: cancel first, then
    /// delete the row once the fetch has actually stopped.
    remove_on_finish: bool,
    received: u64,
    filesize: u64,
}

struct Runner {
    db: QueueDb,
    fetcher: Arc<dyn Fetcher>,
    events: EventSender,
    progress_tx: mpsc::Sender<ProgressUpdate>,
    running: bool,
    active: Option<ActiveFetch>,
}

enum Wake {
    Command(Option<Envelope>),
    Progress(ProgressUpdate),
    Finished(FetchOutcome),
}

impl Runner {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Envelope>,
        mut progress_rx: mpsc::Receiver<ProgressUpdate>,
    ) {
        match self.db.recover_stranded().await {
            Ok(n) if n > 0 => tracing::info!("reset {n} job(s) stranded by a previous run"),
            Err(e) => tracing::error!("stranded-job recovery failed: {e:#}"),
            _ => {}
        }

        loop {
            let wake = if let Some(fetch) = self.active.as_mut() {
                tokio::select! {
                    // Pending progress samples are drained before the
                    // completion is acted on.
                    biased;
                    env = rx.recv() => Wake::Command(env),
                    Some(update) = progress_rx.recv() => Wake::Progress(update),
                    res = &mut fetch.handle => Wake::Finished(match res {
                        Ok(outcome) => outcome,
                        Err(e) => FetchOutcome::Failed(format!("fetch task failed: {e}")),
                    }),
                }
            } else {
                tokio::select! {
                    env = rx.recv() => Wake::Command(env),
                    Some(update) = progress_rx.recv() => Wake::Progress(update),
                }
            };

            match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(env)) => self.handle_envelope(env).await,
                Wake::Progress(update) => self.handle_progress(update).await,
                Wake::Finished(outcome) => self.finish_active(outcome).await,
            }
        }

        // Mailbox fully closed: the process is going down. Let the in-flight
        // fetch stop at its next checkpoint.
        if let Some(fetch) = &self.active {
            fetch.abort.store(true, Ordering::Relaxed);
        }
        tracing::debug!("download worker mailbox closed, runner exiting");
    }

    async fn handle_envelope(&mut self, env: Envelope) {
        let command = match DownloadCommand::from_envelope(&env) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(kind = ?env.kind, "rejected command: {e}");
                self.emit(WorkerEvent::Error(e.event_message())).await;
                self.emit_queue_state().await;
                return;
            }
        };

        match command {
            DownloadCommand::LoadAll => self.handle_load_all().await,
            DownloadCommand::AddJobs(specs) => self.handle_add_jobs(&specs).await,
            DownloadCommand::Start => {
                self.running = true;
                self.emit_queue_state().await;
                self.maybe_start_next().await;
            }
            DownloadCommand::Stop => {
                self.running = false;
                if let Some(fetch) = &self.active {
                    tracing::info!(id = fetch.id, "stop requested, cancelling active download");
                    fetch.abort.store(true, Ordering::Relaxed);
                }
                self.emit_queue_state().await;
            }
            DownloadCommand::RemoveJob(id) => self.handle_remove_job(id).await,
            DownloadCommand::RemoveByState(min_state) => {
                self.handle_remove_by_state(min_state).await
            }
            DownloadCommand::RetryAll => {
                match self.db.retry_all().await {
                    Ok(n) => tracing::info!("retrying {n} failed job(s)"),
                    Err(e) => {
                        tracing::error!("retry failed: {e:#}");
                        self.emit(WorkerEvent::Error(format!("retry failed: {e}"))).await;
                    }
                }
                self.emit_queue_state().await;
                self.maybe_start_next().await;
            }
            DownloadCommand::UpdateSettings(json) => {
                self.fetcher.update_settings(&json);
                self.emit_queue_state().await;
            }
        }
    }

    async fn handle_load_all(&mut self) {
        match self.db.list_jobs().await {
            Ok(jobs) => {
                let entries: Vec<ProgressEntry> = jobs.iter().map(|j| self.entry_for(j)).collect();
                self.emit(WorkerEvent::Progress(entries)).await;
            }
            Err(e) => {
                tracing::error!("queue snapshot failed: {e:#}");
                self.emit(WorkerEvent::Error(format!("queue snapshot failed: {e}")))
                    .await;
            }
        }
        self.emit_queue_state().await;
    }

    async fn handle_add_jobs(&mut self, specs: &[super::job::JobSpec]) {
        match self.db.add_jobs(specs).await {
            Ok(ids) => {
                tracing::debug!("enqueued {} job(s)", ids.len());
                // Push the affected rows so the controller's view picks up
                // new and reactivated entries without a LoadAll round trip.
                if let Ok(jobs) = self.db.list_jobs().await {
                    let entries: Vec<ProgressEntry> = jobs
                        .iter()
                        .filter(|j| ids.contains(&j.id))
                        .map(|j| self.entry_for(j))
                        .collect();
                    self.emit(WorkerEvent::Progress(entries)).await;
                }
            }
            Err(e) => {
                tracing::error!("enqueue failed: {e:#}");
                self.emit(WorkerEvent::Error(format!("enqueue failed: {e}")))
                    .await;
            }
        }
        self.emit_queue_state().await;
        self.maybe_start_next().await;
    }

    async fn handle_remove_job(&mut self, id: JobId) {
        if let Some(fetch) = self.active.as_mut() {
            if fetch.id == id {
                // Cancel first; the row is deleted once the fetch stops so an
                // in-flight transfer never writes against a removed record.
                tracing::info!(id, "removing active job, cancelling first");
                fetch.remove_on_finish = true;
                fetch.abort.store(true, Ordering::Relaxed);
                self.emit_queue_state().await;
                return;
            }
        }
        if let Err(e) = self.db.remove_job(id).await {
            tracing::error!(id, "remove failed: {e:#}");
            self.emit(WorkerEvent::Error(format!("remove failed: {e}")))
                .await;
        }
        self.emit_queue_state().await;
    }

    async fn handle_remove_by_state(&mut self, min_state: JobState) {
        let mut exclude = None;
        if let Some(fetch) = self.active.as_mut() {
            if JobState::Downloading.as_i64() >= min_state.as_i64() {
                fetch.remove_on_finish = true;
                fetch.abort.store(true, Ordering::Relaxed);
                exclude = Some(fetch.id);
            }
        }
        match self.db.remove_by_state(min_state, exclude).await {
            Ok(n) => tracing::info!("removed {n} job(s) at state >= {}", min_state.as_i64()),
            Err(e) => {
                tracing::error!("bulk remove failed: {e:#}");
                self.emit(WorkerEvent::Error(format!("bulk remove failed: {e}")))
                    .await;
            }
        }
        self.emit_queue_state().await;
    }

    /// Claim and start the next job if the runner is running and idle.
    /// A drained queue parks the runner until the next Start.
    async fn maybe_start_next(&mut self) {
        if !self.running || self.active.is_some() {
            return;
        }
        match self.db.claim_next_job().await {
            Ok(Some(job)) => self.start_fetch(job).await,
            Ok(None) => {
                self.running = false;
                tracing::info!("queue drained, runner idle");
                self.emit_queue_state().await;
            }
            Err(e) => {
                tracing::error!("claim failed: {e:#}");
                self.running = false;
                self.emit(WorkerEvent::Error(format!("claim failed: {e}")))
                    .await;
                self.emit_queue_state().await;
            }
        }
    }

    async fn start_fetch(&mut self, job: Job) {
        let abort = Arc::new(AtomicBool::new(false));
        let sink = ProgressSink::new(job.id, self.progress_tx.clone());
        let fetcher = Arc::clone(&self.fetcher);
        let abort_task = Arc::clone(&abort);
        let id = job.id;
        let quality = job.quality;
        tracing::info!(id, source_id = %job.source_id, "starting download");

        let handle = tokio::task::spawn_blocking(move || fetcher.fetch(&job, &sink, &abort_task));
        self.active = Some(ActiveFetch {
            id,
            quality,
            abort,
            handle,
            remove_on_finish: false,
            received: 0,
            filesize: 0,
        });
        self.emit(WorkerEvent::Progress(vec![ProgressEntry {
            id,
            state: JobState::Downloading.as_i64(),
            received: 0,
            filesize: 0,
            quality,
        }]))
        .await;
    }

    async fn handle_progress(&mut self, update: ProgressUpdate) {
        let Some(fetch) = self.active.as_mut() else {
            return; // stale report from a fetch that already finished
        };
        if fetch.id != update.id {
            return;
        }
        fetch.received = update.received;
        fetch.filesize = update.filesize;
        let entry = ProgressEntry {
            id: update.id,
            state: JobState::Downloading.as_i64(),
            received: update.received,
            filesize: update.filesize,
            quality: fetch.quality,
        };
        self.emit(WorkerEvent::Progress(vec![entry])).await;
    }

    async fn finish_active(&mut self, outcome: FetchOutcome) {
        let Some(fetch) = self.active.take() else {
            return;
        };

        if fetch.remove_on_finish {
            tracing::info!(id = fetch.id, "deleting record of cancelled job");
            if let Err(e) = self.db.remove_job(fetch.id).await {
                tracing::error!(id = fetch.id, "remove after cancel failed: {e:#}");
            }
            self.emit_queue_state().await;
            self.maybe_start_next().await;
            return;
        }

        match outcome {
            FetchOutcome::Aborted => {
                // Stop at a checkpoint: the row keeps its last committed
                // state; a later Start resumes it. That Start may already
                // have arrived while the abort was pending, in which case
                // the runner claims again right away.
                tracing::info!(id = fetch.id, "download paused");
                self.emit_queue_state().await;
                self.maybe_start_next().await;
            }
            FetchOutcome::Done => {
                self.transition(&fetch, JobState::Post).await;
                self.transition(&fetch, JobState::Done).await;
                self.emit_queue_state().await;
                self.maybe_start_next().await;
            }
            FetchOutcome::Failed(msg) => {
                tracing::warn!(id = fetch.id, "download failed: {msg}");
                self.transition(&fetch, JobState::Error).await;
                self.emit_queue_state().await;
                self.maybe_start_next().await;
            }
            FetchOutcome::ServiceDenied(msg) => {
                tracing::warn!(id = fetch.id, "download refused by service: {msg}");
                self.transition(&fetch, JobState::DeezerError).await;
                self.emit_queue_state().await;
                self.maybe_start_next().await;
            }
        }
    }

    async fn transition(&mut self, fetch: &ActiveFetch, state: JobState) {
        if let Err(e) = self.db.set_state(fetch.id, state).await {
            tracing::error!(id = fetch.id, "state update failed: {e:#}");
            return;
        }
        self.emit(WorkerEvent::Progress(vec![ProgressEntry {
            id: fetch.id,
            state: state.as_i64(),
            received: fetch.received,
            filesize: fetch.filesize,
            quality: fetch.quality,
        }]))
        .await;
    }

    fn entry_for(&self, job: &Job) -> ProgressEntry {
        let (received, filesize) = match &self.active {
            Some(fetch) if fetch.id == job.id => (fetch.received, fetch.filesize),
            _ => (0, 0),
        };
        ProgressEntry {
            id: job.id,
            state: job.state.as_i64(),
            received,
            filesize,
            quality: job.quality,
        }
    }

    async fn emit(&self, event: WorkerEvent) {
        if self.events.try_send(event.into_envelope()).is_err() {
            tracing::debug!("controller mailbox unavailable, event dropped");
        }
    }

    async fn emit_queue_state(&mut self) {
        match self.db.queue_size().await {
            Ok(n) => {
                self.emit(WorkerEvent::QueueState {
                    running: self.running,
                    queue_size: n,
                })
                .await
            }
            Err(e) => tracing::error!("queue size query failed: {e:#}"),
        }
    }
}
