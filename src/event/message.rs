//! Message event wrapper.
//!
//! Shaped after the DOM `MessageEvent`: the payload plus the usual event
//! bookkeeping fields. The bookkeeping fields are fixed values kept for
//! structural familiarity; nothing in this crate bubbles or cancels.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::protocol::Data;
use crate::socket::WebSocket;

// ============================================================================
// MessageEvent
// ============================================================================

/// An inbound message, wrapped for dispatch.
///
/// Built fresh for every message the transport delivers. Listeners and the
/// `onmessage` handler receive the same instance.
#[derive(Clone)]
pub struct MessageEvent {
    /// Payload exactly as delivered by the transport.
    data: Data,
    /// The socket that received the message.
    target: WebSocket,
    /// Construction time.
    time_stamp: SystemTime,
}

impl MessageEvent {
    /// The event type name.
    pub const TYPE: &'static str = "message";

    /// Wraps `data` received by `target`.
    pub(crate) fn new(target: WebSocket, data: Data) -> Self {
        Self {
            data,
            target,
            time_stamp: SystemTime::now(),
        }
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Consumes the event, returning the payload.
    #[inline]
    #[must_use]
    pub fn into_data(self) -> Data {
        self.data
    }

    /// Deserializes the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload is not
    /// valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.data {
            Data::Text(text) => serde_json::from_str(text)?,
            Data::Binary(bytes) => serde_json::from_slice(bytes)?,
        };
        Ok(value)
    }

    /// Returns the event type, always `"message"`.
    #[inline]
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        Self::TYPE
    }

    /// Returns the socket that received the message.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &WebSocket {
        &self.target
    }

    /// Same as [`target`](Self::target).
    #[inline]
    #[must_use]
    pub fn current_target(&self) -> &WebSocket {
        &self.target
    }

    /// Same as [`target`](Self::target).
    #[inline]
    #[must_use]
    pub fn src_element(&self) -> &WebSocket {
        &self.target
    }

    /// Returns the construction time.
    #[inline]
    #[must_use]
    pub fn time_stamp(&self) -> SystemTime {
        self.time_stamp
    }

    /// Returns the construction time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn time_stamp_millis(&self) -> u64 {
        self.time_stamp
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }

    /// Always `false`.
    #[inline]
    #[must_use]
    pub const fn bubbles(&self) -> bool {
        false
    }

    /// Always `false`.
    #[inline]
    #[must_use]
    pub const fn cancelable(&self) -> bool {
        false
    }

    /// Always `false`.
    #[inline]
    #[must_use]
    pub const fn cancel_bubble(&self) -> bool {
        false
    }

    /// Always `0` (`NONE`).
    #[inline]
    #[must_use]
    pub const fn event_phase(&self) -> u16 {
        0
    }
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("data", &self.data)
            .field("target", &self.target.id())
            .field("time_stamp", &self.time_stamp)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
