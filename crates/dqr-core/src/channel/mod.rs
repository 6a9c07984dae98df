//! Typed message channel between the controller and its workers.
//!
//! A message is an [`Envelope`]: a tagged kind, a flat primitive payload, and
//! an optional reply endpoint (carried only by `Register`). Each direction is
//! one bounded mpsc mailbox: FIFO per direction, at-most-once, no ack layer.
//! Sends on a dead mailbox fail immediately with `ChannelClosed` instead of
//! queuing.

mod message;
mod payload;

#[cfg(test)]
mod tests;

pub use message::{DownloadCommand, RecognitionCommand, WorkerEvent};
pub use payload::{Payload, Value};

use tokio::sync::mpsc;

/// Protocol revision of the message-kind set below. Bump when the set changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Closed set of message kinds. Commands flow controller -> worker, events
/// flow worker -> controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    // Commands (either role)
    Register,
    Unregister,
    Configure,
    Start,
    Cancel,
    QueryState,
    LoadAll,
    AddJobs,
    StartQueue,
    StopQueue,
    RemoveJob,
    RemoveByState,
    RetryAll,
    UpdateSettings,
    // Events
    Result,
    Volume,
    Error,
    State,
    Progress,
    QueueState,
}

/// Endpoint for events flowing back to the controller.
pub type EventSender = mpsc::Sender<Envelope>;
/// Endpoint for commands flowing to a worker.
pub type CommandSender = mpsc::Sender<Envelope>;

/// One message on the wire: kind, flat payload, optional return address.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: MessageKind,
    pub payload: Payload,
    /// Return address for worker events. Only meaningful on `Register`; the
    /// payload map holds primitives only, so the endpoint rides alongside.
    pub reply_to: Option<EventSender>,
}

impl Envelope {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            payload: Payload::new(),
            reply_to: None,
        }
    }

    pub fn with_payload(kind: MessageKind, payload: Payload) -> Self {
        Self {
            kind,
            payload,
            reply_to: None,
        }
    }
}

/// Create one mailbox (one direction of the channel).
pub fn mailbox(capacity: usize) -> (mpsc::Sender<Envelope>, mpsc::Receiver<Envelope>) {
    mpsc::channel(capacity.max(1))
}
