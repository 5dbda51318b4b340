//! Newline-delimited JSON framing for [`Message`]s.
//!
//! Each frame is one JSON object followed by `\n`. The codec is
//! resumable: a partial frame left in the buffer is completed by a
//! later read. Frames longer than [`MAX_FRAME_LEN`] are rejected
//! before any parse attempt.

use crate::message::Message;
use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Hard cap on a single encoded frame, including the delimiter.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Errors surfaced while framing or deframing messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame exceeds {max} bytes")]
    FrameTooLong { max: usize },

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Codec for the chat wire format.
#[derive(Debug, Clone)]
pub struct ChatCodec {
    max_frame_len: usize,
}

impl ChatCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl Default for ChatCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChatCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        match src.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if pos + 1 > self.max_frame_len {
                    return Err(ProtocolError::FrameTooLong {
                        max: self.max_frame_len,
                    });
                }
                let frame = src.split_to(pos + 1);
                let mut line = &frame[..pos];
                if line.ends_with(b"\r") {
                    line = &line[..line.len() - 1];
                }
                let msg = serde_json::from_slice(line)?;
                Ok(Some(msg))
            }
            None => {
                // No delimiter yet. If the buffer already exceeds the
                // cap, no amount of further input can save this frame.
                if src.len() > self.max_frame_len {
                    return Err(ProtocolError::FrameTooLong {
                        max: self.max_frame_len,
                    });
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Message> for ChatCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let json = serde_json::to_vec(&msg)?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}
