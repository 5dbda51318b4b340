//! Chatter relay daemon - connection registry and broadcast router
//!
//! This crate provides the server half of the chat system:
//! - `router` - Router actor owning the connection registry and fan-out
//! - `server` - TCP (optionally mutual-TLS) listener and session handlers
//! - `tls` - Certificate loading and rustls configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     chatterd server                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │   ChatServer    │────▶│       Router actor          │    │
//! │  │ (TCP listener)  │     │   (registry + ordering)     │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │ connections                 │ fan-out           │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ SessionHandler  │◀────│   per-peer mpsc queues      │    │
//! │  │  (per client)   │     │                             │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All messages flow through the single router task, so every client
//! observes chat, join, and leave notices in the same total order.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod router;
pub mod server;
pub mod tls;

pub use router::{spawn_router, ConnectionId, PeerInfo, RouterHandle};
pub use server::{ChatServer, ServerError};
pub use tls::{TlsError, TlsSettings};
