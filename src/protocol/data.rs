//! Payload and close-frame types.
//!
//! [`Data`] is the opaque payload carried by `send` and by message events.
//! It is passed through untouched; interpreting it is the caller's business.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;

// ============================================================================
// Data
// ============================================================================

/// A message payload, text or binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum Data {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Data {
    /// Returns the text content, if this is a text payload.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the raw bytes of the payload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the payload size in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for text payloads.
    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl From<String> for Data {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Data {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<&[u8]> for Data {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(bytes.to_vec())
    }
}

impl PartialEq<str> for Data {
    fn eq(&self, other: &str) -> bool {
        self.as_text() == Some(other)
    }
}

impl PartialEq<&str> for Data {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

impl From<Data> for Message {
    fn from(data: Data) -> Self {
        match data {
            Data::Text(text) => Message::Text(text.into()),
            Data::Binary(bytes) => Message::Binary(bytes.into()),
        }
    }
}

// ============================================================================
// CloseCode
// ============================================================================

/// WebSocket close code (RFC 6455).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal closure.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint going away.
    pub const GOING_AWAY: Self = Self(1001);
    /// Protocol error.
    pub const PROTOCOL_ERROR: Self = Self(1002);
    /// Unsupported data type.
    pub const UNSUPPORTED: Self = Self(1003);
    /// No status code present.
    pub const NO_STATUS: Self = Self(1005);
    /// Connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);
    /// Invalid payload data.
    pub const INVALID_PAYLOAD: Self = Self(1007);
    /// Policy violation.
    pub const POLICY_VIOLATION: Self = Self(1008);
    /// Message too big.
    pub const MESSAGE_TOO_BIG: Self = Self(1009);
    /// Internal server error.
    pub const INTERNAL_ERROR: Self = Self(1011);
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CloseFrame
// ============================================================================

/// Close frame data reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseFrame {
    /// Close code.
    pub code: CloseCode,
    /// Close reason (may be empty).
    pub reason: String,
}

impl CloseFrame {
    /// Creates a new close frame.
    #[inline]
    #[must_use]
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Frame used when the connection dropped without a close handshake.
    #[inline]
    #[must_use]
    pub fn abnormal() -> Self {
        Self::new(CloseCode::ABNORMAL, "")
    }

    /// Returns `true` for a 1000 close.
    #[inline]
    #[must_use]
    pub fn was_clean(&self) -> bool {
        self.code == CloseCode::NORMAL
    }
}

impl From<WsCloseFrame> for CloseFrame {
    fn from(frame: WsCloseFrame) -> Self {
        Self {
            code: CloseCode(u16::from(frame.code)),
            reason: frame.reason.as_str().to_owned(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
