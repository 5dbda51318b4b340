//! Error types for the chatter TUI.
//!
//! This module defines client-specific errors that can occur during
//! terminal initialization, server connection, and UI rendering.
//!
//! **Panic-Free Policy:** This module follows the panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use thiserror::Error;

use chatter_protocol::ProtocolError;

/// TUI application errors.
///
/// Most errors include actionable information for the user:
/// - Connection errors name the address that refused us
/// - Terminal errors suggest checking terminal compatibility
#[derive(Error, Debug)]
pub enum TuiError {
    /// Failed to initialize the terminal.
    ///
    /// Common causes include running in a non-TTY environment (pipes,
    /// scripts) or an unsupported terminal emulator.
    #[error("Failed to initialize terminal: {0}")]
    TerminalInit(String),

    /// Failed to cleanup/restore the terminal.
    ///
    /// The terminal may be left in an inconsistent state; running
    /// `reset` can help recover.
    #[error("Failed to restore terminal: {0}")]
    TerminalCleanup(String),

    /// Failed to connect to the chat server.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The host string is not a valid TLS server name.
    #[error("Invalid server name for TLS: {0}")]
    ServerName(String),

    /// Wire protocol error from the server connection.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error passthrough.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience Result type alias for TUI operations.
pub type Result<T> = std::result::Result<T, TuiError>;
