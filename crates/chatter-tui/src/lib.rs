//! Chatter TUI - terminal chat client
//!
//! This crate implements the client half of the chat system: a ratatui
//! interface with a scrollable chat viewport and an input line, driven
//! by a single cooperative event loop.
//!
//! A submitted line is not shown locally until the server echoes it
//! back, so what the user sees is exactly what everyone else saw, in
//! the same order.

pub mod app;
pub mod client;
pub mod error;
pub mod input;
pub mod run;
pub mod ui;

pub use error::{Result, TuiError};
pub use run::{run, UiOptions};
