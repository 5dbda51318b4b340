//! TCP server for the chat relay.
//!
//! The server:
//! - Listens on a TCP socket, optionally wrapped in mutual TLS
//! - Spawns a SessionHandler for each accepted connection
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SessionHandler  │────▶│  RouterHandle   │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         ▲
//!         │ fan-out queue
//! ┌───────┴─────────┐
//! │  Router actor   │
//! └─────────────────┘
//! ```
//!
//! With TLS enabled, the handshake must finish within
//! [`HANDSHAKE_TIMEOUT`]; a connection that fails or stalls the
//! handshake is dropped before it ever reaches the router.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{SessionHandler, SessionState};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::router::{ConnectionId, RouterHandle};

/// Upper bound on the TLS handshake for one accepted connection.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `run` waits for session handlers after the accept loop
/// stops. Must exceed the session flush bound so close-time drains
/// can finish before the runtime is dropped.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// TCP server for the chat relay.
///
/// Accepts connections and hands each one to a session handler task.
pub struct ChatServer {
    /// Bound listener, held so tests can query the ephemeral port
    listener: TcpListener,

    /// TLS acceptor when mutual TLS is enabled
    tls: Option<TlsAcceptor>,

    /// Handle to the router actor
    router: RouterHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection ids
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listener.
    ///
    /// # Arguments
    ///
    /// * `host` - Interface to listen on
    /// * `port` - TCP port, 0 for an ephemeral port
    /// * `tls` - Server TLS configuration, if mutual TLS is enabled
    /// * `router` - Handle to the router actor
    /// * `cancel_token` - Token for graceful shutdown
    pub async fn bind(
        host: &str,
        port: u16,
        tls: Option<Arc<ServerConfig>>,
        router: RouterHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            tls: tls.map(TlsAcceptor::from),
            router,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Runs the accept loop.
    ///
    /// Listens for connections until the cancellation token is
    /// triggered, then waits for the session handlers to finish their
    /// close-time flush before returning. Callers may drop the runtime
    /// once this returns.
    pub async fn run(&self) {
        if let Some(addr) = self.local_addr() {
            info!(
                addr = %addr,
                tls = self.tls.is_some(),
                "Chat server listening"
            );
        }

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let id = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(&mut sessions, stream, addr, id);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }

                // Reap finished sessions so the set stays small.
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        let drained = timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = sessions.len(),
                "Sessions still open at shutdown deadline, aborting"
            );
            sessions.abort_all();
        }
    }

    /// Hands an accepted connection to a session handler task.
    fn handle_connection(
        &self,
        sessions: &mut JoinSet<()>,
        stream: TcpStream,
        addr: SocketAddr,
        id: ConnectionId,
    ) {
        let router = self.router.clone();
        let cancel_token = self.cancel_token.clone();
        let tls = self.tls.clone();

        sessions.spawn(async move {
            match tls {
                Some(acceptor) => {
                    let tls_stream =
                        match timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                            Ok(Ok(s)) => s,
                            Ok(Err(e)) => {
                                warn!(connection_id = id, addr = %addr, error = %e, "TLS handshake failed");
                                return;
                            }
                            Err(_) => {
                                warn!(connection_id = id, addr = %addr, "TLS handshake timed out");
                                return;
                            }
                        };

                    let identity = peer_identity(&tls_stream);
                    let handler = SessionHandler::new(id, addr, identity, router, cancel_token);
                    handler.run(tls_stream).await;
                }
                None => {
                    let handler = SessionHandler::new(id, addr, None, router, cancel_token);
                    handler.run(stream).await;
                }
            }
        });
    }
}

/// Extracts the client's leaf certificate from a completed handshake.
fn peer_identity(
    stream: &tokio_rustls::server::TlsStream<TcpStream>,
) -> Option<CertificateDer<'static>> {
    stream
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|certs| certs.first().cloned())
        .map(CertificateDer::into_owned)
}
