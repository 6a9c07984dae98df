//! Recognition session worker.
//!
//! One tokio task owns the configure -> listening -> result/error cycle.
//! Commands arrive serialized on the worker mailbox, engine callbacks on a
//! second mpsc; the session state is single-writer. Every rejected or failed
//! command is followed by an authoritative `State` broadcast, so the
//! registered controller never has to guess.

use std::time::Instant;

use tokio::sync::mpsc;

use crate::channel::{mailbox, CommandSender, Envelope, EventSender, RecognitionCommand, WorkerEvent};
use crate::error::CoreError;

use super::engine::{EngineCallback, EngineConfig, RecognitionEngine};

/// Spawn the recognition worker around an engine instance. Returns its
/// command mailbox; events flow to whichever client registered last.
pub fn spawn(engine: Box<dyn RecognitionEngine>, mailbox_capacity: usize) -> CommandSender {
    let (cmd_tx, cmd_rx) = mailbox(mailbox_capacity);
    let (callback_tx, callback_rx) = mpsc::channel(mailbox_capacity.max(1));
    let session = Session {
        engine,
        callback_tx,
        configured: false,
        listening: false,
        started_at: None,
        client: None,
    };
    tokio::spawn(session.run(cmd_rx, callback_rx));
    cmd_tx
}

struct Session {
    engine: Box<dyn RecognitionEngine>,
    callback_tx: mpsc::Sender<EngineCallback>,
    configured: bool,
    listening: bool,
    started_at: Option<Instant>,
    client: Option<EventSender>,
}

impl Session {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Envelope>,
        mut callback_rx: mpsc::Receiver<EngineCallback>,
    ) {
        loop {
            tokio::select! {
                env = rx.recv() => match env {
                    Some(env) => self.handle_envelope(env).await,
                    None => break,
                },
                Some(callback) = callback_rx.recv() => self.handle_callback(callback).await,
            }
        }

        // Session end: force-cancel any in-flight attempt, then free the engine.
        if self.listening {
            self.engine.cancel();
            self.listening = false;
        }
        self.engine.release();
        tracing::debug!("recognition worker mailbox closed, session released");
    }

    async fn handle_envelope(&mut self, env: Envelope) {
        let command = match RecognitionCommand::from_envelope(&env) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(kind = ?env.kind, "rejected command: {e}");
                self.send_error(e.event_message()).await;
                self.broadcast_state().await;
                return;
            }
        };

        match command {
            RecognitionCommand::Register(reply_to) => {
                tracing::info!("controller registered");
                self.client = Some(reply_to);
                // The fresh client learns the current state immediately.
                self.broadcast_state().await;
            }
            RecognitionCommand::Unregister => {
                tracing::info!("controller unregistered");
                self.client = None;
            }
            RecognitionCommand::Configure {
                host,
                access_key,
                access_secret,
            } => {
                self.handle_configure(host, access_key, access_secret).await;
                self.broadcast_state().await;
            }
            RecognitionCommand::Start => self.handle_start().await,
            RecognitionCommand::Cancel => {
                if self.listening {
                    self.engine.cancel();
                    self.listening = false;
                    self.started_at = None;
                    tracing::info!("recognition cancelled");
                } else {
                    tracing::debug!("cancel with no attempt in flight");
                }
                self.broadcast_state().await;
            }
            RecognitionCommand::QueryState => self.broadcast_state().await,
        }
    }

    async fn handle_configure(&mut self, host: String, access_key: String, access_secret: String) {
        if host.is_empty() || access_key.is_empty() || access_secret.is_empty() {
            let e = CoreError::InvalidArgument("recognition credentials missing or empty".into());
            tracing::warn!("{e}");
            self.send_error(e.event_message()).await;
            return;
        }

        // Teardown before rebuild: cancel any attempt, release the old
        // engine session, then initialize with the new credentials.
        if self.listening {
            self.engine.cancel();
            self.listening = false;
            self.started_at = None;
        }
        if self.configured {
            self.engine.release();
            self.configured = false;
        }

        let config = EngineConfig {
            host,
            access_key,
            access_secret,
        };
        self.configured = self.engine.init(&config, self.callback_tx.clone());
        if self.configured {
            tracing::info!(host = %config.host, "recognition engine configured");
        } else {
            tracing::error!("recognition engine initialization failed");
            self.send_error("recognition engine initialization failed".to_string())
                .await;
        }
    }

    async fn handle_start(&mut self) {
        if !self.configured {
            let e = CoreError::NotReady("cannot start: session not configured".into());
            tracing::warn!("{e}");
            self.send_error(e.event_message()).await;
            self.broadcast_state().await;
            return;
        }
        if self.listening {
            tracing::debug!("start while already listening, re-broadcasting state");
            self.broadcast_state().await;
            return;
        }

        if self.engine.start_listen() {
            self.listening = true;
            self.started_at = Some(Instant::now());
            tracing::info!("recognition started");
        } else {
            self.send_error("recognition engine failed to start listening".to_string())
                .await;
        }
        self.broadcast_state().await;
    }

    async fn handle_callback(&mut self, callback: EngineCallback) {
        match callback {
            EngineCallback::Result(raw) => self.handle_result(raw).await,
            EngineCallback::Volume(level) => {
                // Suppressed unless an attempt is in flight, so a cancel is
                // not followed by spurious level updates.
                if self.listening {
                    self.send_event(WorkerEvent::Volume(level)).await;
                }
            }
        }
    }

    async fn handle_result(&mut self, raw: String) {
        if !self.listening {
            // Cancel landed just before the engine's asynchronous result.
            tracing::warn!("stale engine result ignored");
            return;
        }
        self.listening = false;
        if let Some(started) = self.started_at.take() {
            tracing::info!("recognition result after {} ms", started.elapsed().as_millis());
        }

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => self.send_event(WorkerEvent::Result(value)).await,
            Err(e) => {
                let e = CoreError::MalformedResult(e.to_string());
                tracing::error!("{e}");
                self.send_error(e.event_message()).await;
            }
        }
        self.broadcast_state().await;
    }

    async fn send_event(&self, event: WorkerEvent) {
        let Some(client) = &self.client else {
            tracing::debug!("no client registered, event dropped");
            return;
        };
        if client.try_send(event.into_envelope()).is_err() {
            tracing::warn!("client mailbox unavailable, event dropped");
        }
    }

    async fn send_error(&self, message: String) {
        self.send_event(WorkerEvent::Error(message)).await;
    }

    async fn broadcast_state(&self) {
        self.send_event(WorkerEvent::State {
            initialized: self.configured,
            processing: self.listening,
        })
        .await;
    }
}
