//! Notification pump.
//!
//! The [`Dispatcher`] is the single consumer of a socket's notification
//! queue. Everything observable (transport notifications, failed sends, the
//! synthetic close) is queued and then dispatched from here, one entry at a
//! time, so listeners never run concurrently.
//!
//! The dispatcher keeps its socket alive until the terminal `close` has been
//! dispatched, then only holds a [`WeakWebSocket`]. After `close`, failures
//! are still dispatched and everything else is dropped. The loop ends when
//! the queue closes or the socket is gone.
//!
//! [`WebSocket::new`](crate::WebSocket::new) spawns [`Dispatcher::run`] on the
//! runtime. [`WebSocket::with_transport`](crate::WebSocket::with_transport)
//! hands the dispatcher to the caller, who decides when the loop turns.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::identifiers::ConnectionId;
use crate::transport::Notification;

use super::core::{WeakWebSocket, WebSocket};
use super::state::ReadyState;

// ============================================================================
// Dispatcher
// ============================================================================

/// Drives event dispatch for one [`WebSocket`].
pub struct Dispatcher {
    /// Socket identifier, for logging once the socket is gone.
    id: ConnectionId,
    /// The socket whose events are dispatched.
    socket: WeakWebSocket,
    /// Owning handle, released after the terminal `close`.
    owner: Option<WebSocket>,
    /// Receiving end of the notification queue.
    notifications: mpsc::UnboundedReceiver<Notification>,
}

impl Dispatcher {
    /// Creates a dispatcher for `socket`.
    pub(crate) fn new(
        socket: WebSocket,
        notifications: mpsc::UnboundedReceiver<Notification>,
    ) -> Self {
        Self {
            id: socket.id(),
            socket: socket.downgrade(),
            owner: Some(socket),
            notifications,
        }
    }

    /// Returns the socket this dispatcher drives, if it is still alive.
    #[inline]
    #[must_use]
    pub fn socket(&self) -> Option<WebSocket> {
        self.socket.upgrade()
    }

    /// Returns `true` once the terminal `close` has been dispatched.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.socket()
            .is_none_or(|socket| socket.ready_state() == ReadyState::Closed)
    }

    /// Event loop: dispatches notifications until the queue closes or the
    /// socket is dropped.
    pub async fn run(mut self) {
        while let Some(notification) = self.notifications.recv().await {
            if !self.handle(notification) {
                break;
            }
        }

        debug!(id = %self.id, "Dispatcher finished");
    }

    /// Waits for one notification and dispatches it.
    ///
    /// Returns `false` if the queue is closed or the socket is gone.
    pub async fn dispatch_next(&mut self) -> bool {
        match self.notifications.recv().await {
            Some(notification) => self.handle(notification),
            None => false,
        }
    }

    /// Dispatches everything queued right now without waiting.
    ///
    /// Entries queued by listeners while this runs are included. Returns the
    /// number of notifications taken off the queue.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(notification) = self.notifications.try_recv() {
            count += 1;
            if !self.handle(notification) {
                break;
            }
        }
        count
    }

    /// Returns `false` once the socket is gone.
    fn handle(&mut self, notification: Notification) -> bool {
        let Some(socket) = self.socket() else {
            trace!(id = %self.id, ?notification, "Socket dropped, notification discarded");
            return false;
        };

        if socket.ready_state() == ReadyState::Closed && !notification.reports_failure() {
            trace!(id = %self.id, ?notification, "Socket closed, notification dropped");
            return true;
        }

        socket.handle_notification(notification);

        if socket.ready_state() == ReadyState::Closed && self.owner.take().is_some() {
            debug!(id = %self.id, "Socket closed, dispatcher released it");
        }
        true
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("socket", &self.id)
            .field("closed", &self.is_closed())
            .field("owning", &self.owner.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
