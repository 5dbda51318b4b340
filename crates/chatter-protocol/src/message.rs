//! Message types exchanged between peers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a color string is not exactly six hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {0:?}: expected exactly 6 hex digits")]
pub struct InvalidColor(pub String);

/// An RGB display color as six hex digits, e.g. `ff0000`.
///
/// Validated on construction and on deserialization, so a `HexColor`
/// carried by a decoded [`Message`] is always well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    /// Returns the six-digit lowercase hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the color into its red, green, and blue components.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |range: Option<&str>| {
            range
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .unwrap_or(0)
        };
        (
            channel(self.0.get(0..2)),
            channel(self.0.get(2..4)),
            channel(self.0.get(4..6)),
        )
    }
}

impl FromStr for HexColor {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 6 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(InvalidColor(s.to_string()))
        }
    }
}

impl TryFrom<String> for HexColor {
    type Error = InvalidColor;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One chat protocol message.
///
/// The wire representation is a single JSON object with a `type` tag:
///
/// ```json
/// {"type":"chat","username":"alice","color":"ff0000",
///  "timestamp":"2024-01-15T10:00:00Z","body":"hello"}
/// ```
///
/// `body` is present only for `chat`. Anything that does not match this
/// schema is rejected at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A line of chat submitted by a user.
    Chat {
        username: String,
        color: HexColor,
        timestamp: DateTime<Utc>,
        body: String,
    },

    /// A peer joined the channel. Sent by a client as its introductory
    /// frame, and synthesized by the server when announcing the arrival
    /// to everyone else.
    Join {
        username: String,
        color: HexColor,
        timestamp: DateTime<Utc>,
    },

    /// A peer left the channel. Synthesized by the server when a
    /// connection closes.
    Leave {
        username: String,
        color: HexColor,
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    /// Creates a chat message stamped with the current time.
    pub fn chat(username: impl Into<String>, color: HexColor, body: impl Into<String>) -> Self {
        Self::Chat {
            username: username.into(),
            color,
            timestamp: Utc::now(),
            body: body.into(),
        }
    }

    /// Creates a join notice stamped with the current time.
    pub fn join(username: impl Into<String>, color: HexColor) -> Self {
        Self::Join {
            username: username.into(),
            color,
            timestamp: Utc::now(),
        }
    }

    /// Creates a leave notice stamped with the current time.
    pub fn leave(username: impl Into<String>, color: HexColor) -> Self {
        Self::Leave {
            username: username.into(),
            color,
            timestamp: Utc::now(),
        }
    }

    /// The username the message is attributed to.
    pub fn username(&self) -> &str {
        match self {
            Self::Chat { username, .. } | Self::Join { username, .. } | Self::Leave { username, .. } => {
                username
            }
        }
    }

    /// The display color of the originating user.
    pub fn color(&self) -> &HexColor {
        match self {
            Self::Chat { color, .. } | Self::Join { color, .. } | Self::Leave { color, .. } => color,
        }
    }

    /// When the message was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Chat { timestamp, .. }
            | Self::Join { timestamp, .. }
            | Self::Leave { timestamp, .. } => *timestamp,
        }
    }

    /// The chat body, if this is a chat message.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Chat { body, .. } => Some(body),
            _ => None,
        }
    }
}
