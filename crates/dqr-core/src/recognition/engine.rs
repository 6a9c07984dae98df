//! Recognition-engine collaborator seam.

use tokio::sync::mpsc;

/// Credentials handed to the engine on (re)initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub host: String,
    pub access_key: String,
    pub access_secret: String,
}

/// Asynchronous engine callbacks. The engine delivers these from its own
/// single callback context; the worker consumes them serialized off one
/// mpsc, so the session state machine stays single-writer.
#[derive(Debug, Clone)]
pub enum EngineCallback {
    /// Raw result payload; structural validation happens in the session.
    Result(String),
    /// Input level while an attempt is in flight.
    Volume(f64),
}

/// The stateful audio-fingerprint engine behind the recognition session.
///
/// `init` receives the callback endpoint to deliver [`EngineCallback`]s on.
/// `release` must force-cancel any in-flight attempt before freeing
/// resources; it is called on every re-configure (teardown before rebuild)
/// and at session end.
///
/// `Sync` is required because the session task holds the engine across
/// awaits while broadcasting events.
pub trait RecognitionEngine: Send + Sync + 'static {
    fn init(&mut self, config: &EngineConfig, callbacks: mpsc::Sender<EngineCallback>) -> bool;

    fn start_listen(&mut self) -> bool;

    fn cancel(&mut self);

    fn release(&mut self);
}
