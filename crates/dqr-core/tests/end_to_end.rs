//! End-to-end lifecycle tests: controller-side connection manager and event
//! forwarder wired to real worker tasks over the message channel.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use dqr_core::channel::{DownloadCommand, Envelope, RecognitionCommand, WorkerEvent};
use dqr_core::connection::{ConnectionManager, WorkerRole};
use dqr_core::forwarder::{EventForwarder, EventSink};
use dqr_core::queue::{
    worker, FetchOutcome, Fetcher, Job, JobSpec, JobState, ProgressSink, QueueDb,
};
use dqr_core::recognition::{EngineCallback, EngineConfig, RecognitionEngine};
use dqr_core::{channel, recognition};

struct RampFetcher;

impl Fetcher for RampFetcher {
    fn fetch(&self, _job: &Job, progress: &ProgressSink, _abort: &AtomicBool) -> FetchOutcome {
        progress.report(512, 1024);
        progress.report(1024, 1024);
        FetchOutcome::Done
    }
}

async fn recv_event(rx: &mut mpsc::Receiver<Envelope>) -> WorkerEvent {
    let env = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event mailbox closed");
    WorkerEvent::from_envelope(&env).expect("undecodable event")
}

async fn wait_for(
    rx: &mut mpsc::Receiver<Envelope>,
    forwarder: &EventForwarder,
    mut pred: impl FnMut(&WorkerEvent) -> bool,
) -> WorkerEvent {
    loop {
        let event = recv_event(rx).await;
        forwarder.publish(&event);
        if pred(&event) {
            return event;
        }
    }
}

fn recording_sink(log: Arc<Mutex<Vec<WorkerEvent>>>) -> Box<dyn EventSink> {
    Box::new(move |event: &WorkerEvent| {
        log.lock().unwrap().push(event.clone());
        Ok(())
    })
}

#[tokio::test]
async fn download_lifecycle_through_the_channel() {
    let dir = tempfile::tempdir().unwrap();
    let db = QueueDb::open_at(dir.path().join("queue.db")).await.unwrap();

    let (ev_tx, mut ev_rx) = channel::mailbox(64);
    let cmd_tx = worker::spawn(db.clone(), Arc::new(RampFetcher), ev_tx.clone(), 64);

    let mut mgr = ConnectionManager::new(ev_tx);
    mgr.connect(WorkerRole::Download, cmd_tx).await.unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut forwarder = EventForwarder::new();
    forwarder.attach(recording_sink(Arc::clone(&log)));

    let spec = JobSpec {
        source_id: "123".into(),
        target_path: dir.path().join("song.mp3").display().to_string(),
        quality: 3,
        ..Default::default()
    };
    mgr.send(
        WorkerRole::Download,
        DownloadCommand::AddJobs(vec![spec]).into_envelope(),
    )
    .await
    .unwrap();
    mgr.send(WorkerRole::Download, DownloadCommand::Start.into_envelope())
        .await
        .unwrap();

    // Progress reaches the full size while downloading, then the job lands
    // in Done and the drained queue parks the runner.
    wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::Progress(entries)
            if entries.iter().any(|p| p.received == 1024 && p.filesize == 1024
                && p.state == JobState::Downloading.as_i64()))
    })
    .await;
    wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::Progress(entries)
            if entries.iter().any(|p| p.state == JobState::Done.as_i64()))
    })
    .await;
    wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::QueueState { running: false, queue_size: 0 })
    })
    .await;

    // Clearing finished jobs leaves an empty snapshot.
    mgr.send(
        WorkerRole::Download,
        DownloadCommand::RemoveByState(JobState::Done).into_envelope(),
    )
    .await
    .unwrap();
    mgr.send(WorkerRole::Download, DownloadCommand::LoadAll.into_envelope())
        .await
        .unwrap();
    let snapshot = wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::Progress(_))
    })
    .await;
    let WorkerEvent::Progress(entries) = snapshot else {
        unreachable!()
    };
    assert!(entries.is_empty());

    // Everything the controller saw went through the forwarder.
    assert!(!log.lock().unwrap().is_empty());
}

struct StubEngine {
    callbacks: Arc<Mutex<Option<mpsc::Sender<EngineCallback>>>>,
}

impl RecognitionEngine for StubEngine {
    fn init(&mut self, _config: &EngineConfig, callbacks: mpsc::Sender<EngineCallback>) -> bool {
        *self.callbacks.lock().unwrap() = Some(callbacks);
        true
    }

    fn start_listen(&mut self) -> bool {
        true
    }

    fn cancel(&mut self) {}

    fn release(&mut self) {}
}

#[tokio::test]
async fn recognition_lifecycle_through_the_channel() {
    let callbacks = Arc::new(Mutex::new(None));
    let cmd_tx = recognition::session::spawn(
        Box::new(StubEngine {
            callbacks: Arc::clone(&callbacks),
        }),
        16,
    );

    let (ev_tx, mut ev_rx) = channel::mailbox(16);
    let mut mgr = ConnectionManager::new(ev_tx);
    // Binding the recognition role registers the return address first, so
    // the state broadcast below already has somewhere to go.
    mgr.connect(WorkerRole::Recognition, cmd_tx).await.unwrap();

    let forwarder = EventForwarder::new();
    wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::State { initialized: false, processing: false })
    })
    .await;

    mgr.send(
        WorkerRole::Recognition,
        RecognitionCommand::Configure {
            host: "identify.example.com".into(),
            access_key: "key".into(),
            access_secret: "secret".into(),
        }
        .into_envelope(),
    )
    .await
    .unwrap();
    mgr.send(
        WorkerRole::Recognition,
        RecognitionCommand::Start.into_envelope(),
    )
    .await
    .unwrap();
    wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::State { initialized: true, processing: true })
    })
    .await;

    let tx = callbacks.lock().unwrap().clone().unwrap();
    tx.try_send(EngineCallback::Result(r#"{"title":"Song"}"#.into()))
        .unwrap();

    let result = wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::Result(_))
    })
    .await;
    let WorkerEvent::Result(value) = result else {
        unreachable!()
    };
    assert_eq!(value["title"], "Song");
    wait_for(&mut ev_rx, &forwarder, |e| {
        matches!(e, WorkerEvent::State { initialized: true, processing: false })
    })
    .await;

    // Explicit disconnect tells the worker to drop the return address.
    mgr.disconnect(WorkerRole::Recognition).await;
    assert!(!mgr.is_bound(WorkerRole::Recognition));
}
