//! Chatter protocol - wire format for the chat relay
//!
//! This crate provides the message schema shared by the relay server and
//! the terminal client, plus the framing codec that converts between
//! `Message` values and newline-delimited JSON on the wire.

pub mod codec;
pub mod message;

pub use codec::{ChatCodec, ProtocolError, MAX_FRAME_LEN};
pub use message::{HexColor, InvalidColor, Message};
