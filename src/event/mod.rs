//! Events delivered by the facade.
//!
//! A [`WebSocket`](crate::WebSocket) emits exactly four kinds of event,
//! named by [`EventKind`]. Each delivery reaches two independent channels,
//! in this order:
//!
//! 1. every listener registered for the kind, in registration order
//! 2. the single legacy handler slot for the kind (`onopen`, ...)
//!
//! Both channels receive the same [`Event`] value.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | [`MessageEvent`] wrapper built for each inbound message |
//! | `registry` | Listener registry and legacy handler slots |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::CloseFrame;

// ============================================================================
// Submodules
// ============================================================================

/// Message event wrapper.
pub mod message;

/// Listener registry and legacy handler slots.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::MessageEvent;
pub use registry::{LegacyHandlers, ListenerRegistry};

// ============================================================================
// Callback Types
// ============================================================================

/// A registered event listener.
///
/// Listeners are compared by identity (`Arc` pointer), so registering a
/// clone of the same `Arc` twice is a no-op while two separately created
/// closures are distinct listeners.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// A legacy handler slot value (`onopen`, `onclose`, ...).
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Wraps a closure into a [`Listener`].
///
/// Keep the returned value around to remove the listener later.
#[inline]
#[must_use]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Returns the handler every legacy slot starts with.
#[inline]
#[must_use]
pub fn noop() -> Handler {
    Arc::new(|_: &Event| {})
}

// ============================================================================
// EventKind
// ============================================================================

/// The fixed set of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Connection opened.
    Open,
    /// Connection closed (terminal).
    Close,
    /// Inbound message.
    Message,
    /// Transport or send failure.
    Error,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 4] = [Self::Open, Self::Close, Self::Message, Self::Error];

    /// Returns the DOM event type name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Message => "message",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            "message" => Ok(Self::Message),
            "error" => Ok(Self::Error),
            other => Err(Error::config(format!("unknown event kind: {other}"))),
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// An event as seen by listeners and legacy handlers.
#[derive(Debug, Clone)]
pub enum Event {
    /// The transport reported the connection open.
    Open,
    /// The connection is closed.
    ///
    /// Carries the transport's close frame, if it supplied one. The close
    /// synthesized for a connection closed before it opened carries none.
    Close(Option<CloseFrame>),
    /// An inbound message.
    Message(MessageEvent),
    /// A transport error or failed send, passed through unwrapped.
    Error(Arc<Error>),
}

impl Event {
    /// Returns the kind of this event.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Close(_) => EventKind::Close,
            Self::Message(_) => EventKind::Message,
            Self::Error(_) => EventKind::Error,
        }
    }

    /// Returns the message event, if this is a message.
    #[inline]
    #[must_use]
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Self::Message(event) => Some(event),
            _ => None,
        }
    }

    /// Returns the error value, if this is an error.
    #[inline]
    #[must_use]
    pub fn as_error(&self) -> Option<&Arc<Error>> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the close frame, if this is a close carrying one.
    #[inline]
    #[must_use]
    pub fn close_frame(&self) -> Option<&CloseFrame> {
        match self {
            Self::Close(frame) => frame.as_ref(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
