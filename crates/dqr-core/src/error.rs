//! Error taxonomy for the coordination core.
//!
//! Every variant is recovered at the point of occurrence and turned into an
//! `Error` event plus a `State`/`QueueState` broadcast; nothing here is
//! allowed to terminate a worker task.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing command field. Rejected synchronously; the
    /// command is never partially applied.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command issued before required setup (e.g. Start before Configure).
    /// State is unchanged and re-broadcast.
    #[error("not ready: {0}")]
    NotReady(String),

    /// Send attempted on an unbound or dead connection. Surfaced to the
    /// caller; fatal to neither side.
    #[error("channel closed")]
    ChannelClosed,

    /// The fetch or recognition collaborator reported a failure. Recorded as
    /// a terminal job state or an Error event.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// The engine produced a result payload that fails structural validation.
    /// Treated as an engine failure, not as success.
    #[error("malformed result: {0}")]
    MalformedResult(String),
}

impl CoreError {
    /// Message suitable for an `Error` event payload.
    pub fn event_message(&self) -> String {
        self.to_string()
    }
}
