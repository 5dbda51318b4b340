//! Per-connection session handler.
//!
//! Each accepted connection runs one `SessionHandler` task that walks a
//! small state machine:
//!
//! ```text
//! AwaitingJoin ──join frame──▶ Active ──disconnect/error──▶ Closing ──▶ Closed
//!      │
//!      └─timeout / wrong frame──▶ Closed (never registered)
//! ```
//!
//! While `Active`, the handler relays inbound chat frames to the router
//! and drains its fan-out queue toward the socket. The registered
//! username and color always win over whatever a chat frame claims, so
//! a client cannot speak as someone else.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - A failed session affects only its own connection

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chatter_protocol::{ChatCodec, Message};

use crate::router::{ConnectionId, PeerInfo, RouterHandle};

/// How long a fresh connection may take to send its join frame.
const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on draining buffered outbound messages at close.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(3);

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, join frame not yet received
    AwaitingJoin,
    /// Registered with the router, relaying messages
    Active,
    /// Deregistered, draining buffered outbound messages
    Closing,
    /// Done
    Closed,
}

/// Handles one client connection from accept to close.
pub struct SessionHandler {
    id: ConnectionId,
    peer_addr: SocketAddr,
    peer_identity: Option<CertificateDer<'static>>,
    router: RouterHandle,
    cancel_token: CancellationToken,
    state: SessionState,
}

impl SessionHandler {
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        peer_identity: Option<CertificateDer<'static>>,
        router: RouterHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_addr,
            peer_identity,
            router,
            cancel_token,
            state: SessionState::AwaitingJoin,
        }
    }

    /// Runs the session to completion and returns its final state.
    ///
    /// Generic over the stream so plain TCP and TLS connections share
    /// one code path.
    pub async fn run<S>(mut self, stream: S) -> SessionState
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FramedRead::new(read_half, ChatCodec::new());
        let mut writer = FramedWrite::new(write_half, ChatCodec::new());

        // First frame must be a join, within the deadline. Until it
        // arrives this connection does not exist as far as the router
        // is concerned.
        let (username, color) = match timeout(JOIN_TIMEOUT, reader.next()).await {
            Ok(Some(Ok(Message::Join {
                username, color, ..
            }))) => (username, color),
            Ok(Some(Ok(other))) => {
                warn!(
                    connection_id = self.id,
                    addr = %self.peer_addr,
                    got = ?other,
                    "Expected join frame, closing"
                );
                self.state = SessionState::Closed;
                return self.state;
            }
            Ok(Some(Err(e))) => {
                warn!(
                    connection_id = self.id,
                    addr = %self.peer_addr,
                    error = %e,
                    "Protocol error before join, closing"
                );
                self.state = SessionState::Closed;
                return self.state;
            }
            Ok(None) => {
                debug!(connection_id = self.id, addr = %self.peer_addr, "Closed before join");
                self.state = SessionState::Closed;
                return self.state;
            }
            Err(_) => {
                warn!(connection_id = self.id, addr = %self.peer_addr, "Join deadline elapsed");
                self.state = SessionState::Closed;
                return self.state;
            }
        };

        let tls_client = self.peer_identity.is_some();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let info = PeerInfo {
            username: username.clone(),
            color: color.clone(),
            addr: self.peer_addr,
            tls_peer: self.peer_identity.take(),
        };

        if let Err(e) = self.router.register(self.id, info, out_tx).await {
            warn!(connection_id = self.id, error = %e, "Registration rejected");
            self.state = SessionState::Closed;
            return self.state;
        }

        self.state = SessionState::Active;
        debug!(
            connection_id = self.id,
            username = %username,
            tls_client,
            "Session active"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!(connection_id = self.id, "Session cancelled");
                    break;
                }

                frame = reader.next() => {
                    match frame {
                        Some(Ok(Message::Chat { timestamp, body, .. })) => {
                            // Re-stamp with the registered identity;
                            // the claimed username and color are
                            // ignored.
                            let msg = Message::Chat {
                                username: username.clone(),
                                color: color.clone(),
                                timestamp,
                                body,
                            };
                            if self.router.publish(msg).is_err() {
                                break;
                            }
                        }
                        Some(Ok(other)) => {
                            warn!(
                                connection_id = self.id,
                                got = ?other,
                                "Unexpected frame while active, closing"
                            );
                            break;
                        }
                        Some(Err(e)) => {
                            warn!(connection_id = self.id, error = %e, "Protocol error, closing");
                            break;
                        }
                        None => {
                            debug!(connection_id = self.id, "Peer disconnected");
                            break;
                        }
                    }
                }

                outbound = out_rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            if let Err(e) = writer.send(msg).await {
                                warn!(connection_id = self.id, error = %e, "Write failed, closing");
                                break;
                            }
                        }
                        None => {
                            debug!(connection_id = self.id, "Fan-out queue closed");
                            break;
                        }
                    }
                }
            }
        }

        self.state = SessionState::Closing;
        let _ = self.router.deregister(self.id);

        // Drain what the router queued before deregistration took
        // effect, bounded so a stuck socket cannot hold the task.
        let flush = async {
            while let Some(msg) = out_rx.recv().await {
                if writer.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = writer.flush().await;
        };
        if timeout(FLUSH_TIMEOUT, flush).await.is_err() {
            debug!(connection_id = self.id, "Flush deadline elapsed");
        }

        self.state = SessionState::Closed;
        debug!(connection_id = self.id, username = %username, "Session closed");
        self.state
    }
}
