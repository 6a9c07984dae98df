//! Fan-out of worker events to the controller's single active listener.
//!
//! At most one listener is attached at a time. Events published with no
//! listener are dropped, not queued; a listener attaching late should pair
//! the attach with a state-resync request (`QueryState` / `LoadAll`).

use crate::channel::WorkerEvent;

/// Listener seam. Failures are logged and swallowed; publishing never
/// propagates an error back into the worker path.
pub trait EventSink: Send {
    fn on_event(&self, event: &WorkerEvent) -> anyhow::Result<()>;
}

impl<F> EventSink for F
where
    F: Fn(&WorkerEvent) -> anyhow::Result<()> + Send,
{
    fn on_event(&self, event: &WorkerEvent) -> anyhow::Result<()> {
        self(event)
    }
}

#[derive(Default)]
pub struct EventForwarder {
    listener: Option<Box<dyn EventSink>>,
}

impl EventForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener, replacing any previous one.
    pub fn attach(&mut self, listener: Box<dyn EventSink>) {
        self.listener = Some(listener);
    }

    pub fn detach(&mut self) {
        self.listener = None;
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub fn publish(&self, event: &WorkerEvent) {
        match &self.listener {
            None => tracing::debug!(?event, "no listener attached, event dropped"),
            Some(sink) => {
                if let Err(e) = sink.on_event(event) {
                    tracing::warn!("event listener failed: {e:#}");
                }
            }
        }
    }
}
