//! Typed commands and events with envelope encode/decode.
//!
//! Decoding is all-or-nothing: a payload missing a required field yields
//! `InvalidArgument` and the command is never partially applied.

use crate::error::CoreError;
use crate::queue::job::{JobId, JobSpec, JobState, ProgressEntry};

use super::{Envelope, EventSender, MessageKind, Payload};

/// Commands understood by the download-queue worker.
#[derive(Debug, Clone)]
pub enum DownloadCommand {
    LoadAll,
    AddJobs(Vec<JobSpec>),
    Start,
    Stop,
    RemoveJob(JobId),
    RemoveByState(JobState),
    RetryAll,
    UpdateSettings(serde_json::Value),
}

impl DownloadCommand {
    pub fn into_envelope(self) -> Envelope {
        match self {
            DownloadCommand::LoadAll => Envelope::new(MessageKind::LoadAll),
            DownloadCommand::AddJobs(specs) => {
                // Serializing plain data structs cannot fail.
                let json = serde_json::to_string(&specs).unwrap_or_else(|_| "[]".into());
                Envelope::with_payload(MessageKind::AddJobs, Payload::new().set_str("jobs", json))
            }
            DownloadCommand::Start => Envelope::new(MessageKind::StartQueue),
            DownloadCommand::Stop => Envelope::new(MessageKind::StopQueue),
            DownloadCommand::RemoveJob(id) => {
                Envelope::with_payload(MessageKind::RemoveJob, Payload::new().set_i64("id", id))
            }
            DownloadCommand::RemoveByState(state) => Envelope::with_payload(
                MessageKind::RemoveByState,
                Payload::new().set_i64("state", state.as_i64()),
            ),
            DownloadCommand::RetryAll => Envelope::new(MessageKind::RetryAll),
            DownloadCommand::UpdateSettings(json) => Envelope::with_payload(
                MessageKind::UpdateSettings,
                Payload::new().set_str("json", json.to_string()),
            ),
        }
    }

    pub fn from_envelope(env: &Envelope) -> Result<Self, CoreError> {
        match env.kind {
            MessageKind::LoadAll => Ok(DownloadCommand::LoadAll),
            MessageKind::AddJobs => {
                let json = env.payload.get_str("jobs")?;
                let specs: Vec<JobSpec> = serde_json::from_str(json).map_err(|e| {
                    CoreError::InvalidArgument(format!("bad job spec list: {e}"))
                })?;
                Ok(DownloadCommand::AddJobs(specs))
            }
            MessageKind::StartQueue => Ok(DownloadCommand::Start),
            MessageKind::StopQueue => Ok(DownloadCommand::Stop),
            MessageKind::RemoveJob => Ok(DownloadCommand::RemoveJob(env.payload.get_i64("id")?)),
            MessageKind::RemoveByState => {
                let raw = env.payload.get_i64("state")?;
                let state = JobState::from_i64(raw).ok_or_else(|| {
                    CoreError::InvalidArgument(format!("unknown job state {raw}"))
                })?;
                Ok(DownloadCommand::RemoveByState(state))
            }
            MessageKind::RetryAll => Ok(DownloadCommand::RetryAll),
            MessageKind::UpdateSettings => {
                let json = env.payload.get_str("json")?;
                let value = serde_json::from_str(json).map_err(|e| {
                    CoreError::InvalidArgument(format!("settings not valid JSON: {e}"))
                })?;
                Ok(DownloadCommand::UpdateSettings(value))
            }
            kind => Err(CoreError::InvalidArgument(format!(
                "unexpected message kind for download worker: {kind:?}"
            ))),
        }
    }
}

/// Commands understood by the recognition worker.
#[derive(Debug, Clone)]
pub enum RecognitionCommand {
    Register(EventSender),
    Unregister,
    Configure {
        host: String,
        access_key: String,
        access_secret: String,
    },
    Start,
    Cancel,
    QueryState,
}

impl RecognitionCommand {
    pub fn into_envelope(self) -> Envelope {
        match self {
            RecognitionCommand::Register(reply_to) => {
                let mut env = Envelope::new(MessageKind::Register);
                env.reply_to = Some(reply_to);
                env
            }
            RecognitionCommand::Unregister => Envelope::new(MessageKind::Unregister),
            RecognitionCommand::Configure {
                host,
                access_key,
                access_secret,
            } => Envelope::with_payload(
                MessageKind::Configure,
                Payload::new()
                    .set_str("host", host)
                    .set_str("access_key", access_key)
                    .set_str("access_secret", access_secret),
            ),
            RecognitionCommand::Start => Envelope::new(MessageKind::Start),
            RecognitionCommand::Cancel => Envelope::new(MessageKind::Cancel),
            RecognitionCommand::QueryState => Envelope::new(MessageKind::QueryState),
        }
    }

    pub fn from_envelope(env: &Envelope) -> Result<Self, CoreError> {
        match env.kind {
            MessageKind::Register => {
                let reply_to = env.reply_to.clone().ok_or_else(|| {
                    CoreError::InvalidArgument("register carries no return address".into())
                })?;
                Ok(RecognitionCommand::Register(reply_to))
            }
            MessageKind::Unregister => Ok(RecognitionCommand::Unregister),
            MessageKind::Configure => Ok(RecognitionCommand::Configure {
                host: env.payload.get_str("host")?.to_string(),
                access_key: env.payload.get_str("access_key")?.to_string(),
                access_secret: env.payload.get_str("access_secret")?.to_string(),
            }),
            MessageKind::Start => Ok(RecognitionCommand::Start),
            MessageKind::Cancel => Ok(RecognitionCommand::Cancel),
            MessageKind::QueryState => Ok(RecognitionCommand::QueryState),
            kind => Err(CoreError::InvalidArgument(format!(
                "unexpected message kind for recognition worker: {kind:?}"
            ))),
        }
    }
}

/// Events flowing from either worker back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Progress(Vec<ProgressEntry>),
    QueueState { running: bool, queue_size: i64 },
    Result(serde_json::Value),
    Volume(f64),
    Error(String),
    State { initialized: bool, processing: bool },
}

impl WorkerEvent {
    pub fn into_envelope(self) -> Envelope {
        match self {
            WorkerEvent::Progress(entries) => {
                let json = serde_json::to_string(&entries).unwrap_or_else(|_| "[]".into());
                Envelope::with_payload(MessageKind::Progress, Payload::new().set_str("jobs", json))
            }
            WorkerEvent::QueueState {
                running,
                queue_size,
            } => Envelope::with_payload(
                MessageKind::QueueState,
                Payload::new()
                    .set_bool("running", running)
                    .set_i64("queue_size", queue_size),
            ),
            WorkerEvent::Result(value) => Envelope::with_payload(
                MessageKind::Result,
                Payload::new().set_str("json", value.to_string()),
            ),
            WorkerEvent::Volume(v) => {
                Envelope::with_payload(MessageKind::Volume, Payload::new().set_f64("volume", v))
            }
            WorkerEvent::Error(message) => Envelope::with_payload(
                MessageKind::Error,
                Payload::new().set_str("message", message),
            ),
            WorkerEvent::State {
                initialized,
                processing,
            } => Envelope::with_payload(
                MessageKind::State,
                Payload::new()
                    .set_bool("initialized", initialized)
                    .set_bool("processing", processing),
            ),
        }
    }

    pub fn from_envelope(env: &Envelope) -> Result<Self, CoreError> {
        match env.kind {
            MessageKind::Progress => {
                let json = env.payload.get_str("jobs")?;
                let entries: Vec<ProgressEntry> = serde_json::from_str(json).map_err(|e| {
                    CoreError::InvalidArgument(format!("bad progress list: {e}"))
                })?;
                Ok(WorkerEvent::Progress(entries))
            }
            MessageKind::QueueState => Ok(WorkerEvent::QueueState {
                running: env.payload.get_bool("running")?,
                queue_size: env.payload.get_i64("queue_size")?,
            }),
            MessageKind::Result => {
                let json = env.payload.get_str("json")?;
                let value = serde_json::from_str(json).map_err(|e| {
                    CoreError::InvalidArgument(format!("result not valid JSON: {e}"))
                })?;
                Ok(WorkerEvent::Result(value))
            }
            MessageKind::Volume => Ok(WorkerEvent::Volume(env.payload.get_f64("volume")?)),
            MessageKind::Error => Ok(WorkerEvent::Error(
                env.payload.get_str("message")?.to_string(),
            )),
            MessageKind::State => Ok(WorkerEvent::State {
                initialized: env.payload.get_bool("initialized")?,
                processing: env.payload.get_bool("processing")?,
            }),
            kind => Err(CoreError::InvalidArgument(format!(
                "unexpected message kind for controller: {kind:?}"
            ))),
        }
    }
}
