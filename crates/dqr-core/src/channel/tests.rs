//! Tests for envelope encode/decode and mailbox failure modes.

use crate::channel::{mailbox, DownloadCommand, Envelope, MessageKind, Payload, RecognitionCommand, WorkerEvent};
use crate::error::CoreError;
use crate::queue::job::{JobSpec, JobState, ProgressEntry};

#[test]
fn download_command_roundtrip() {
    let spec = JobSpec {
        source_id: "123".into(),
        target_path: "/music/a.flac".into(),
        quality: 9,
        ..Default::default()
    };
    let env = DownloadCommand::AddJobs(vec![spec.clone()]).into_envelope();
    assert_eq!(env.kind, MessageKind::AddJobs);
    match DownloadCommand::from_envelope(&env).unwrap() {
        DownloadCommand::AddJobs(specs) => assert_eq!(specs, vec![spec]),
        other => panic!("decoded wrong command: {other:?}"),
    }

    let env = DownloadCommand::RemoveByState(JobState::Done).into_envelope();
    match DownloadCommand::from_envelope(&env).unwrap() {
        DownloadCommand::RemoveByState(state) => assert_eq!(state, JobState::Done),
        other => panic!("decoded wrong command: {other:?}"),
    }
}

#[test]
fn missing_field_is_invalid_argument() {
    // AddJobs without its "jobs" field.
    let env = Envelope::new(MessageKind::AddJobs);
    match DownloadCommand::from_envelope(&env) {
        Err(CoreError::InvalidArgument(msg)) => assert!(msg.contains("jobs"), "{msg}"),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }

    // Configure with a mistyped field.
    let payload = Payload::new()
        .set_str("host", "h")
        .set_i64("access_key", 1)
        .set_str("access_secret", "s");
    let env = Envelope::with_payload(MessageKind::Configure, payload);
    assert!(matches!(
        RecognitionCommand::from_envelope(&env),
        Err(CoreError::InvalidArgument(_))
    ));
}

#[test]
fn out_of_range_state_rejected() {
    let env = Envelope::with_payload(MessageKind::RemoveByState, Payload::new().set_i64("state", 9));
    assert!(matches!(
        DownloadCommand::from_envelope(&env),
        Err(CoreError::InvalidArgument(_))
    ));
}

#[test]
fn register_requires_return_address() {
    let env = Envelope::new(MessageKind::Register);
    assert!(matches!(
        RecognitionCommand::from_envelope(&env),
        Err(CoreError::InvalidArgument(_))
    ));

    let (tx, _rx) = mailbox(4);
    let env = RecognitionCommand::Register(tx).into_envelope();
    assert!(env.reply_to.is_some());
    assert!(matches!(
        RecognitionCommand::from_envelope(&env),
        Ok(RecognitionCommand::Register(_))
    ));
}

#[test]
fn event_roundtrip() {
    let entries = vec![ProgressEntry {
        id: 7,
        state: JobState::Downloading.as_i64(),
        received: 10,
        filesize: 100,
        quality: 3,
    }];
    let env = WorkerEvent::Progress(entries.clone()).into_envelope();
    assert_eq!(
        WorkerEvent::from_envelope(&env).unwrap(),
        WorkerEvent::Progress(entries)
    );

    let env = WorkerEvent::State {
        initialized: true,
        processing: false,
    }
    .into_envelope();
    assert_eq!(
        WorkerEvent::from_envelope(&env).unwrap(),
        WorkerEvent::State {
            initialized: true,
            processing: false
        }
    );
}

#[test]
fn malformed_result_json_rejected() {
    let env = Envelope::with_payload(MessageKind::Result, Payload::new().set_str("json", "{nope"));
    assert!(matches!(
        WorkerEvent::from_envelope(&env),
        Err(CoreError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn send_on_dead_mailbox_fails_immediately() {
    let (tx, rx) = mailbox(4);
    drop(rx);
    let err = tx.send(Envelope::new(MessageKind::Start)).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn mailbox_is_fifo() {
    let (tx, mut rx) = mailbox(8);
    tx.send(Envelope::new(MessageKind::Start)).await.unwrap();
    tx.send(Envelope::new(MessageKind::Cancel)).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().kind, MessageKind::Start);
    assert_eq!(rx.recv().await.unwrap().kind, MessageKind::Cancel);
}
