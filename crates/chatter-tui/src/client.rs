//! Server connection task for the chatter TUI.
//!
//! Owns the socket to the relay server. Inbound frames become
//! [`Event::Inbound`] events for the main loop; submitted messages
//! arrive on the outbound channel and are written to the socket.
//! When the connection drops, a single [`Event::Disconnected`] is
//! emitted and the task exits.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chatter_protocol::{ChatCodec, Message};

use crate::error::TuiError;
use crate::input::Event;

/// A connected stream to the server, plain or TLS.
#[derive(Debug)]
pub enum ServerStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// Connects to the server, wrapping the stream in TLS when a client
/// configuration is provided.
///
/// With TLS the host doubles as the server name for certificate
/// verification, matching how the server certificate is issued.
pub async fn connect(
    host: &str,
    port: u16,
    tls: Option<Arc<ClientConfig>>,
) -> Result<ServerStream, TuiError> {
    let addr = format!("{host}:{port}");
    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|source| TuiError::Connect {
            addr: addr.clone(),
            source,
        })?;

    match tls {
        Some(config) => {
            let name = ServerName::try_from(host.to_string())
                .map_err(|_| TuiError::ServerName(host.to_string()))?;
            let stream = TlsConnector::from(config)
                .connect(name, tcp)
                .await
                .map_err(|source| TuiError::Connect { addr, source })?;
            Ok(ServerStream::Tls(Box::new(stream)))
        }
        None => Ok(ServerStream::Plain(tcp)),
    }
}

/// Drives one server connection until it closes or shutdown.
pub struct ServerConnection {
    /// Events toward the main loop
    event_tx: mpsc::UnboundedSender<Event>,

    /// Messages submitted by the user
    outbound_rx: mpsc::UnboundedReceiver<Message>,

    /// Token for graceful shutdown
    cancel_token: CancellationToken,

    /// The join frame announcing our identity
    hello: Message,
}

impl ServerConnection {
    pub fn new(
        event_tx: mpsc::UnboundedSender<Event>,
        outbound_rx: mpsc::UnboundedReceiver<Message>,
        cancel_token: CancellationToken,
        hello: Message,
    ) -> Self {
        Self {
            event_tx,
            outbound_rx,
            cancel_token,
            hello,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(self, stream: ServerStream) {
        match stream {
            ServerStream::Plain(s) => self.drive(s).await,
            ServerStream::Tls(s) => self.drive(*s).await,
        }
    }

    async fn drive<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, ChatCodec::new());

        // Introduce ourselves before anything else; the server ignores
        // us until it has seen the join.
        if let Err(e) = framed.send(self.hello.clone()).await {
            warn!(error = %e, "Failed to send join frame");
            let _ = self.event_tx.send(Event::Disconnected);
            return;
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Server connection shutting down");
                    break;
                }

                frame = framed.next() => {
                    match frame {
                        Some(Ok(msg)) => {
                            if self.event_tx.send(Event::Inbound(msg)).is_err() {
                                debug!("Event channel closed, connection task exiting");
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Protocol error from server");
                            let _ = self.event_tx.send(Event::Disconnected);
                            break;
                        }
                        None => {
                            debug!("Server closed the connection");
                            let _ = self.event_tx.send(Event::Disconnected);
                            break;
                        }
                    }
                }

                outbound = self.outbound_rx.recv() => {
                    match outbound {
                        Some(msg) => {
                            if let Err(e) = framed.send(msg).await {
                                warn!(error = %e, "Failed to send message");
                                let _ = self.event_tx.send(Event::Disconnected);
                                break;
                            }
                        }
                        None => {
                            debug!("Outbound channel closed");
                            break;
                        }
                    }
                }
            }
        }
    }
}
