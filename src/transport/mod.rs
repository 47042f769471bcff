//! Transport seam.
//!
//! The facade never touches the network. A [`Transport`] does the I/O and
//! reports what happens through a [`Notifier`], which feeds the facade's
//! notification queue. The queue is drained by a single
//! [`Dispatcher`](crate::Dispatcher), so every event is observed in order and
//! on one logical thread.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  transmit / request_close   ┌─────────────────┐
//! │  WebSocket      │────────────────────────────►│  Transport      │
//! │  (facade)       │                             │  (I/O task)     │
//! │                 │◄──── Notifier (mpsc) ───────│                 │
//! │  Dispatcher     │  open/close/message/error   │                 │
//! └─────────────────┘                             └─────────────────┘
//! ```
//!
//! # Transport Contract
//!
//! - `open` once, when the connection is established
//! - `message(data)` per inbound payload
//! - `error(err)` for failures; the transport keeps running
//! - `close(frame)` once, after `open`, when the connection ends
//! - on `request_close` before `open`, nothing further is required
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | [`TungsteniteTransport`] over `tokio-tungstenite` |

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{CloseFrame, Data};

// ============================================================================
// Submodules
// ============================================================================

/// `tokio-tungstenite` transport and its I/O loop.
pub mod connection;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::TungsteniteTransport;

// ============================================================================
// Types
// ============================================================================

/// Completion callback for [`Transport::transmit`].
///
/// Called exactly once with the outcome of the transmission.
pub type Completion = Box<dyn FnOnce(Result<()>) + Send>;

// ============================================================================
// Transport
// ============================================================================

/// The network collaborator wrapped by a [`WebSocket`](crate::WebSocket).
///
/// Both methods must return promptly; the actual work happens elsewhere
/// and is reported through the [`Notifier`] the transport was built with.
pub trait Transport: Send + Sync {
    /// Queues `data` for transmission; `completion` reports the outcome.
    fn transmit(&self, data: Data, completion: Completion);

    /// Asks the transport to close the connection.
    fn request_close(&self);
}

// ============================================================================
// Notification
// ============================================================================

/// Entries of the facade's notification queue.
#[derive(Debug)]
pub enum Notification {
    /// Transport opened.
    Open,
    /// Transport closed.
    Close(Option<CloseFrame>),
    /// Inbound payload.
    Message(Data),
    /// Transport error.
    Error(Error),
    /// A transmission completed with an error.
    TransmitFailed(Error),
    /// Close synthesized for a connection closed before it opened.
    SyntheticClose,
}

impl Notification {
    /// Returns `true` for entries that report a failure.
    ///
    /// Failures are still dispatched once the socket is closed.
    #[inline]
    #[must_use]
    pub fn reports_failure(&self) -> bool {
        matches!(self, Self::Error(_) | Self::TransmitFailed(_))
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Sending half of the notification queue, handed to the transport.
///
/// Notifications sent after the dispatcher has gone away are dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Creates a connected notifier/receiver pair.
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Reports the connection open.
    pub fn open(&self) {
        self.notify(Notification::Open);
    }

    /// Reports the connection closed.
    pub fn close(&self, frame: Option<CloseFrame>) {
        self.notify(Notification::Close(frame));
    }

    /// Reports an inbound payload.
    pub fn message(&self, data: impl Into<Data>) {
        self.notify(Notification::Message(data.into()));
    }

    /// Reports a transport error.
    pub fn error(&self, err: Error) {
        self.notify(Notification::Error(err));
    }

    /// Reports a failed transmission.
    pub(crate) fn transmit_failed(&self, err: Error) {
        self.notify(Notification::TransmitFailed(err));
    }

    /// Queues the synthetic close.
    pub(crate) fn synthetic_close(&self) {
        self.notify(Notification::SyntheticClose);
    }

    /// Returns `true` once the receiving side is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            trace!(notification = ?e.0, "Dispatcher gone, notification dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
