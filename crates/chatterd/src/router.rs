//! Router actor - connection registry and ordered broadcast.
//!
//! The router is a single task owning the registry of connected peers.
//! Session handlers talk to it through a cheap-to-clone [`RouterHandle`].
//! Because every register, publish, and deregister funnels through one
//! command queue, all peers observe the resulting notices in the same
//! total order.
//!
//! Fan-out is non-blocking: each peer has an unbounded outbound queue,
//! and a peer whose queue is gone (its handler already exited) is simply
//! skipped. Removal happens exactly once, through `Deregister`, so a
//! disconnecting peer produces a single leave notice.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RouterError::ChannelClosed`

use std::collections::BTreeMap;
use std::net::SocketAddr;

use rustls::pki_types::CertificateDer;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatter_protocol::{HexColor, Message};

/// Identifies one accepted connection for the lifetime of the server.
pub type ConnectionId = u64;

/// Registry entry for a connected peer.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub username: String,
    pub color: HexColor,
    pub addr: SocketAddr,
    /// Verified client certificate when the connection is mutual TLS.
    pub tls_peer: Option<CertificateDer<'static>>,
}

/// A registered peer: its identity plus the queue its session handler
/// drains toward the socket.
#[derive(Debug)]
struct Peer {
    info: PeerInfo,
    outbound: mpsc::UnboundedSender<Message>,
}

/// Errors returned by router handle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    #[error("router channel closed")]
    ChannelClosed,
}

/// Commands processed by the router task.
enum RouterCommand {
    Register {
        id: ConnectionId,
        info: PeerInfo,
        outbound: mpsc::UnboundedSender<Message>,
        respond_to: oneshot::Sender<Result<(), RouterError>>,
    },
    Publish {
        message: Message,
    },
    Deregister {
        id: ConnectionId,
    },
    Peers {
        respond_to: oneshot::Sender<Vec<(ConnectionId, PeerInfo)>>,
    },
}

// ============================================================================
// Router Handle
// ============================================================================

/// Handle for interacting with the router actor.
///
/// Cheap to clone; every session handler holds one.
#[derive(Clone)]
pub struct RouterHandle {
    sender: mpsc::UnboundedSender<RouterCommand>,
}

impl RouterHandle {
    /// Registers a peer and broadcasts its join notice to everyone
    /// already present.
    ///
    /// # Errors
    ///
    /// - `RouterError::AlreadyRegistered` if the id is already in use
    /// - `RouterError::ChannelClosed` if the router has shut down
    pub async fn register(
        &self,
        id: ConnectionId,
        info: PeerInfo,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Result<(), RouterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RouterCommand::Register {
                id,
                info,
                outbound,
                respond_to: tx,
            })
            .map_err(|_| RouterError::ChannelClosed)?;

        rx.await.map_err(|_| RouterError::ChannelClosed)?
    }

    /// Publishes a message to every registered peer, including the
    /// originator. Ordering is decided by arrival at the router.
    pub fn publish(&self, message: Message) -> Result<(), RouterError> {
        self.sender
            .send(RouterCommand::Publish { message })
            .map_err(|_| RouterError::ChannelClosed)
    }

    /// Removes a peer and broadcasts its leave notice to the remainder.
    ///
    /// Idempotent: deregistering an unknown id is a no-op.
    pub fn deregister(&self, id: ConnectionId) -> Result<(), RouterError> {
        self.sender
            .send(RouterCommand::Deregister { id })
            .map_err(|_| RouterError::ChannelClosed)
    }

    /// Returns a snapshot of the registry, ordered by connection id.
    pub async fn peers(&self) -> Result<Vec<(ConnectionId, PeerInfo)>, RouterError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RouterCommand::Peers { respond_to: tx })
            .map_err(|_| RouterError::ChannelClosed)?;

        rx.await.map_err(|_| RouterError::ChannelClosed)
    }
}

// ============================================================================
// Router Actor
// ============================================================================

/// The router task state: the registry of connected peers.
struct Router {
    peers: BTreeMap<ConnectionId, Peer>,
}

impl Router {
    fn new() -> Self {
        Self {
            peers: BTreeMap::new(),
        }
    }

    fn handle(&mut self, cmd: RouterCommand) {
        match cmd {
            RouterCommand::Register {
                id,
                info,
                outbound,
                respond_to,
            } => {
                let result = self.register(id, info, outbound);
                let _ = respond_to.send(result);
            }
            RouterCommand::Publish { message } => {
                self.broadcast(&message);
            }
            RouterCommand::Deregister { id } => {
                self.deregister(id);
            }
            RouterCommand::Peers { respond_to } => {
                let snapshot = self
                    .peers
                    .iter()
                    .map(|(id, peer)| (*id, peer.info.clone()))
                    .collect();
                let _ = respond_to.send(snapshot);
            }
        }
    }

    fn register(
        &mut self,
        id: ConnectionId,
        info: PeerInfo,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Result<(), RouterError> {
        if self.peers.contains_key(&id) {
            return Err(RouterError::AlreadyRegistered(id));
        }

        // Announce the arrival to everyone already present. The
        // newcomer does not hear its own join.
        let notice = Message::join(info.username.clone(), info.color.clone());
        self.broadcast(&notice);

        info!(
            connection_id = id,
            username = %info.username,
            addr = %info.addr,
            peers = self.peers.len() + 1,
            "Peer joined"
        );

        self.peers.insert(id, Peer { info, outbound });
        Ok(())
    }

    fn deregister(&mut self, id: ConnectionId) {
        let Some(peer) = self.peers.remove(&id) else {
            debug!(connection_id = id, "Deregister for unknown connection");
            return;
        };

        info!(
            connection_id = id,
            username = %peer.info.username,
            peers = self.peers.len(),
            "Peer left"
        );

        let notice = Message::leave(peer.info.username, peer.info.color);
        self.broadcast(&notice);
    }

    /// Sends a message to every registered peer's outbound queue.
    ///
    /// A closed queue means the handler is already on its way out; its
    /// own `Deregister` will remove it, so the failure is only logged.
    fn broadcast(&self, message: &Message) {
        for (id, peer) in &self.peers {
            if peer.outbound.send(message.clone()).is_err() {
                debug!(connection_id = id, "Outbound queue closed, skipping peer");
            }
        }
    }
}

/// Spawns the router task and returns a handle to it.
///
/// The task runs until the cancellation token fires or every handle is
/// dropped.
pub fn spawn_router(cancel_token: CancellationToken) -> RouterHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut router = Router::new();

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Router shutting down");
                    break;
                }

                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => router.handle(cmd),
                        None => {
                            debug!("All router handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        if !router.peers.is_empty() {
            warn!(peers = router.peers.len(), "Router stopped with peers connected");
        }
    });

    RouterHandle { sender: tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer_info(name: &str) -> PeerInfo {
        PeerInfo {
            username: name.to_string(),
            color: "ff0000".parse().expect("valid color"),
            addr: "127.0.0.1:9999".parse().expect("valid addr"),
            tls_peer: None,
        }
    }

    fn register(
        router: &mut Router,
        id: ConnectionId,
        name: &str,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        router
            .register(id, peer_info(name), tx)
            .expect("registration succeeds");
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_register_announces_to_existing_peers_only() {
        let mut router = Router::new();
        let mut alice_rx = register(&mut router, 1, "alice");
        let mut bob_rx = register(&mut router, 2, "bob");

        let alice_saw = drain(&mut alice_rx);
        assert_eq!(alice_saw.len(), 1);
        assert!(matches!(&alice_saw[0], Message::Join { username, .. } if username == "bob"));

        // The newcomer does not hear its own join.
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut router = Router::new();
        let _rx = register(&mut router, 1, "alice");

        let (tx, _rx2) = mpsc::unbounded_channel();
        let err = router.register(1, peer_info("imposter"), tx).unwrap_err();
        assert_eq!(err, RouterError::AlreadyRegistered(1));
    }

    #[test]
    fn test_publish_reaches_everyone_including_origin() {
        let mut router = Router::new();
        let mut alice_rx = register(&mut router, 1, "alice");
        let mut bob_rx = register(&mut router, 2, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let msg = Message::chat("alice", "ff0000".parse().expect("valid color"), "hello");
        router.broadcast(&msg);

        assert_eq!(drain(&mut alice_rx), vec![msg.clone()]);
        assert_eq!(drain(&mut bob_rx), vec![msg]);
    }

    #[test]
    fn test_deregister_broadcasts_leave_to_remainder() {
        let mut router = Router::new();
        let mut alice_rx = register(&mut router, 1, "alice");
        let _bob_rx = register(&mut router, 2, "bob");
        drain(&mut alice_rx);

        router.deregister(2);

        let alice_saw = drain(&mut alice_rx);
        assert_eq!(alice_saw.len(), 1);
        assert!(matches!(&alice_saw[0], Message::Leave { username, .. } if username == "bob"));
    }

    #[test]
    fn test_deregister_unknown_is_noop() {
        let mut router = Router::new();
        let mut alice_rx = register(&mut router, 1, "alice");

        router.deregister(42);

        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(router.peers.len(), 1);
    }

    #[test]
    fn test_broadcast_skips_closed_queue() {
        let mut router = Router::new();
        let alice_rx = register(&mut router, 1, "alice");
        let mut bob_rx = register(&mut router, 2, "bob");
        drain(&mut bob_rx);
        drop(alice_rx);

        let msg = Message::chat("bob", "00ff00".parse().expect("valid color"), "hi");
        router.broadcast(&msg);

        // Bob still gets it; the dead peer stays registered until its
        // handler deregisters.
        assert_eq!(drain(&mut bob_rx), vec![msg]);
        assert_eq!(router.peers.len(), 2);
    }

    #[tokio::test]
    async fn test_handle_register_and_peers() {
        let cancel = CancellationToken::new();
        let handle = spawn_router(cancel.clone());

        let (tx, _rx) = mpsc::unbounded_channel();
        handle
            .register(1, peer_info("alice"), tx)
            .await
            .expect("registration succeeds");

        let peers = handle.peers().await.expect("router alive");
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].0, 1);
        assert_eq!(peers[0].1.username, "alice");

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_handle_errors_after_shutdown() {
        let cancel = CancellationToken::new();
        let handle = spawn_router(cancel.clone());
        cancel.cancel();

        // Give the router task a chance to observe cancellation.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = handle.register(1, peer_info("alice"), tx).await;
        assert_eq!(result, Err(RouterError::ChannelClosed));
    }
}
