//! Connection state machine.
//!
//! States only ever move forward:
//!
//! ```text
//! CONNECTING ──open──► OPEN ──close()──► CLOSING ──close──► CLOSED
//!      │                                    ▲
//!      └──────────────close()───────────────┘
//! ```
//!
//! A transport `close` moves any state straight to `CLOSED`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ReadyState
// ============================================================================

/// Externally visible connection state.
///
/// Ordered, so `a < b` means `a` comes earlier in the lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReadyState {
    /// Handshake in progress (initial).
    Connecting = 0,
    /// Connection established.
    Open = 1,
    /// Close requested, waiting for the transport.
    Closing = 2,
    /// Connection closed (terminal).
    Closed = 3,
}

impl ReadyState {
    /// Returns the numeric constant (`0..=3`).
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a numeric constant back to a state.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Connecting),
            1 => Some(Self::Open),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns the constant name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }

    /// State after a transport `open`, or `None` if it must be ignored.
    #[inline]
    pub(crate) fn on_open(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Open),
            _ => None,
        }
    }

    /// State after a transport `close`, or `None` if already closed.
    #[inline]
    pub(crate) fn on_close(self) -> Option<Self> {
        match self {
            Self::Closed => None,
            _ => Some(Self::Closed),
        }
    }
}

impl From<ReadyState> for u8 {
    fn from(state: ReadyState) -> Self {
        state.as_u8()
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CloseAction
// ============================================================================

/// What `close()` has to do in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseAction {
    /// Forward, move to `CLOSING`, and queue the synthetic close.
    Synthesize,
    /// Forward and move to `CLOSING`.
    Forward,
    /// Already `CLOSING`: forward again, nothing else.
    Repeat,
    /// Already `CLOSED`.
    Ignore,
}

impl CloseAction {
    /// Picks the action for `state`.
    #[inline]
    pub(crate) fn for_state(state: ReadyState) -> Self {
        match state {
            ReadyState::Connecting => Self::Synthesize,
            ReadyState::Open => Self::Forward,
            ReadyState::Closing => Self::Repeat,
            ReadyState::Closed => Self::Ignore,
        }
    }

    /// State to move to, if any.
    #[inline]
    pub(crate) fn next_state(self) -> Option<ReadyState> {
        match self {
            Self::Synthesize | Self::Forward => Some(ReadyState::Closing),
            Self::Repeat | Self::Ignore => None,
        }
    }

    /// Whether the request reaches the transport.
    #[inline]
    pub(crate) fn forwards(self) -> bool {
        !matches!(self, Self::Ignore)
    }
}

// ============================================================================
// Tests
// ============================================================================
