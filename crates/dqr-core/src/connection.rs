//! Connection lifecycle for the two worker roles.
//!
//! A link goes `Unbound -> Binding -> Bound`, and back to `Unbound` on
//! explicit disconnect or when a send hits a dead mailbox. Binding the
//! recognition role registers the controller's return address before any
//! other command; the worker cannot route events back until then. There is
//! no auto-reconnect: rebinding happens on the caller's next explicit action.

use crate::channel::{CommandSender, Envelope, EventSender, MessageKind, RecognitionCommand};
use crate::error::CoreError;

/// The two worker roles behind one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Download,
    Recognition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unbound,
    Binding,
    Bound,
}

#[derive(Debug)]
struct Link {
    state: LinkState,
    peer: Option<CommandSender>,
}

impl Link {
    fn new() -> Self {
        Self {
            state: LinkState::Unbound,
            peer: None,
        }
    }

    fn clear(&mut self) {
        self.state = LinkState::Unbound;
        self.peer = None;
    }
}

/// Owns one link per role plus the controller's return address.
pub struct ConnectionManager {
    download: Link,
    recognition: Link,
    return_addr: EventSender,
}

impl ConnectionManager {
    pub fn new(return_addr: EventSender) -> Self {
        Self {
            download: Link::new(),
            recognition: Link::new(),
            return_addr,
        }
    }

    fn link(&mut self, role: WorkerRole) -> &mut Link {
        match role {
            WorkerRole::Download => &mut self.download,
            WorkerRole::Recognition => &mut self.recognition,
        }
    }

    pub fn state(&self, role: WorkerRole) -> LinkState {
        match role {
            WorkerRole::Download => self.download.state,
            WorkerRole::Recognition => self.recognition.state,
        }
    }

    pub fn is_bound(&self, role: WorkerRole) -> bool {
        self.state(role) == LinkState::Bound
    }

    /// Bind a role to a worker mailbox. Rebinding an already-bound role
    /// replaces the peer. For the recognition role, `Register` (with the
    /// return address) is sent before anything else.
    pub async fn connect(&mut self, role: WorkerRole, peer: CommandSender) -> Result<(), CoreError> {
        let return_addr = self.return_addr.clone();
        let link = self.link(role);
        link.state = LinkState::Binding;
        link.peer = Some(peer);

        if role == WorkerRole::Recognition {
            let register = RecognitionCommand::Register(return_addr).into_envelope();
            if let Err(e) = self.send_inner(role, register).await {
                self.link(role).clear();
                return Err(e);
            }
        }
        self.link(role).state = LinkState::Bound;
        tracing::info!(?role, "worker bound");
        Ok(())
    }

    /// Explicitly unbind a role. The recognition worker is told to drop the
    /// return address first (best effort).
    pub async fn disconnect(&mut self, role: WorkerRole) {
        if role == WorkerRole::Recognition && self.is_bound(role) {
            let unregister = Envelope::new(MessageKind::Unregister);
            let _ = self.send_inner(role, unregister).await;
        }
        self.link(role).clear();
        tracing::info!(?role, "worker unbound");
    }

    /// Unexpected-drop signal from the transport: forget the peer, stay down.
    pub fn on_dropped(&mut self, role: WorkerRole) {
        tracing::warn!(?role, "worker connection dropped");
        self.link(role).clear();
    }

    /// Send a command to a bound role. `ChannelClosed` on an unbound role is
    /// a no-op failure for the caller, not a fault.
    pub async fn send(&mut self, role: WorkerRole, env: Envelope) -> Result<(), CoreError> {
        if self.state(role) != LinkState::Bound {
            return Err(CoreError::ChannelClosed);
        }
        self.send_inner(role, env).await
    }

    async fn send_inner(&mut self, role: WorkerRole, env: Envelope) -> Result<(), CoreError> {
        let sender = match self.link(role).peer.clone() {
            Some(s) => s,
            None => return Err(CoreError::ChannelClosed),
        };
        if sender.send(env).await.is_err() {
            // Peer mailbox is gone; treat as an unexpected drop.
            self.on_dropped(role);
            return Err(CoreError::ChannelClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mailbox;

    #[tokio::test]
    async fn send_on_unbound_is_channel_closed() {
        let (ev_tx, _ev_rx) = mailbox(4);
        let mut mgr = ConnectionManager::new(ev_tx);
        let err = mgr
            .send(WorkerRole::Download, Envelope::new(MessageKind::StartQueue))
            .await;
        assert!(matches!(err, Err(CoreError::ChannelClosed)));
        assert_eq!(mgr.state(WorkerRole::Download), LinkState::Unbound);
    }

    #[tokio::test]
    async fn recognition_bind_registers_first() {
        let (ev_tx, _ev_rx) = mailbox(4);
        let (cmd_tx, mut cmd_rx) = mailbox(4);
        let mut mgr = ConnectionManager::new(ev_tx);
        mgr.connect(WorkerRole::Recognition, cmd_tx).await.unwrap();
        assert!(mgr.is_bound(WorkerRole::Recognition));

        mgr.send(WorkerRole::Recognition, Envelope::new(MessageKind::Start))
            .await
            .unwrap();

        let first = cmd_rx.recv().await.unwrap();
        assert_eq!(first.kind, MessageKind::Register);
        assert!(first.reply_to.is_some());
        let second = cmd_rx.recv().await.unwrap();
        assert_eq!(second.kind, MessageKind::Start);
    }

    #[tokio::test]
    async fn download_bind_does_not_register() {
        let (ev_tx, _ev_rx) = mailbox(4);
        let (cmd_tx, mut cmd_rx) = mailbox(4);
        let mut mgr = ConnectionManager::new(ev_tx);
        mgr.connect(WorkerRole::Download, cmd_tx).await.unwrap();
        mgr.send(WorkerRole::Download, Envelope::new(MessageKind::LoadAll))
            .await
            .unwrap();
        assert_eq!(cmd_rx.recv().await.unwrap().kind, MessageKind::LoadAll);
    }

    #[tokio::test]
    async fn dead_peer_unbinds_on_send() {
        let (ev_tx, _ev_rx) = mailbox(4);
        let (cmd_tx, cmd_rx) = mailbox(4);
        let mut mgr = ConnectionManager::new(ev_tx);
        mgr.connect(WorkerRole::Download, cmd_tx).await.unwrap();
        drop(cmd_rx);

        let err = mgr
            .send(WorkerRole::Download, Envelope::new(MessageKind::LoadAll))
            .await;
        assert!(matches!(err, Err(CoreError::ChannelClosed)));
        assert_eq!(mgr.state(WorkerRole::Download), LinkState::Unbound);

        // Subsequent sends keep failing without panicking.
        let err = mgr
            .send(WorkerRole::Download, Envelope::new(MessageKind::LoadAll))
            .await;
        assert!(matches!(err, Err(CoreError::ChannelClosed)));
    }

    #[tokio::test]
    async fn disconnect_sends_unregister() {
        let (ev_tx, _ev_rx) = mailbox(4);
        let (cmd_tx, mut cmd_rx) = mailbox(4);
        let mut mgr = ConnectionManager::new(ev_tx);
        mgr.connect(WorkerRole::Recognition, cmd_tx).await.unwrap();
        let _ = cmd_rx.recv().await; // Register
        mgr.disconnect(WorkerRole::Recognition).await;
        assert_eq!(cmd_rx.recv().await.unwrap().kind, MessageKind::Unregister);
        assert!(!mgr.is_bound(WorkerRole::Recognition));
    }
}
