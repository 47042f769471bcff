//! The browser-style WebSocket facade.
//!
//! [`WebSocket`] wraps one [`Transport`] and presents the browser API on top
//! of it: `readyState`, `send`, `close`, `addEventListener` /
//! `removeEventListener` and the `on*` handler properties.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::event::{
    Event, EventKind, Handler, LegacyHandlers, Listener, ListenerRegistry, MessageEvent,
};
use crate::identifiers::ConnectionId;
use crate::protocol::{Data, SubProtocols};
use crate::transport::connection::build_request;
use crate::transport::{Notification, Notifier, Transport, TungsteniteTransport};

use super::dispatcher::Dispatcher;
use super::options::WebSocketOptions;
use super::state::{CloseAction, ReadyState};

// ============================================================================
// Types
// ============================================================================

/// Both dispatch channels, guarded together.
#[derive(Debug, Default)]
struct EventTargets {
    listeners: ListenerRegistry,
    handlers: LegacyHandlers,
}

impl EventTargets {
    /// Drops callbacks for every kind that cannot fire after `close`.
    fn release_closed(&mut self) -> usize {
        let mut released = 0;
        for kind in EventKind::ALL.into_iter().filter(|k| !fires_after_close(*k)) {
            released += self.listeners.clear(kind);
            self.handlers.set(kind, None);
        }
        released
    }
}

/// Only failures are still reported once the socket is closed.
#[inline]
fn fires_after_close(kind: EventKind) -> bool {
    kind == EventKind::Error
}

/// Internal shared state for a socket.
pub(crate) struct WebSocketInner {
    /// Identifier used in log fields.
    id: ConnectionId,
    /// Target URL.
    url: Url,
    /// Requested sub-protocols.
    protocols: SubProtocols,
    /// Current state; only the facade writes it.
    state: Mutex<ReadyState>,
    /// The wrapped transport.
    transport: Box<dyn Transport>,
    /// Sender into this socket's own notification queue.
    notifier: Notifier,
    /// Listener registry and legacy handlers.
    targets: Mutex<EventTargets>,
}

// ============================================================================
// WebSocket
// ============================================================================

/// A browser-compatible WebSocket.
///
/// Cloning yields another handle to the same connection.
///
/// Once the terminal `close` has been dispatched, `open`, `close` and
/// `message` callbacks are released, so they may capture a clone of the
/// socket. `error` callbacks stay registered to report late send failures;
/// give them a [`WeakWebSocket`] instead.
///
/// # Example
///
/// ```no_run
/// use websocket_compat::{Event, EventKind, WebSocket, listener};
///
/// # async fn example() -> websocket_compat::Result<()> {
/// let ws = WebSocket::new("ws://127.0.0.1:9001/chat", "chat.v1")?;
///
/// let sender = ws.clone();
/// ws.set_onopen(move |_| sender.send("hello"));
/// ws.add_event_listener(
///     EventKind::Message,
///     listener(|event| {
///         if let Event::Message(message) = event {
///             println!("received {:?}", message.data());
///         }
///     }),
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WebSocket {
    /// Shared inner state.
    pub(crate) inner: Arc<WebSocketInner>,
}

/// Non-owning handle to a [`WebSocket`], for use inside callbacks.
#[derive(Clone)]
pub struct WeakWebSocket {
    inner: Weak<WebSocketInner>,
}

impl WeakWebSocket {
    /// Returns the socket if it is still alive.
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<WebSocket> {
        self.inner.upgrade().map(|inner| WebSocket { inner })
    }
}

impl fmt::Debug for WeakWebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakWebSocket")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ============================================================================
// WebSocket - Display
// ============================================================================

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url.as_str())
            .field("protocol", &self.inner.protocols)
            .field("ready_state", &self.ready_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// WebSocket - Constants
// ============================================================================

impl WebSocket {
    /// Handshake in progress.
    pub const CONNECTING: ReadyState = ReadyState::Connecting;
    /// Connection established.
    pub const OPEN: ReadyState = ReadyState::Open;
    /// Close requested.
    pub const CLOSING: ReadyState = ReadyState::Closing;
    /// Connection closed.
    pub const CLOSED: ReadyState = ReadyState::Closed;
}

// ============================================================================
// WebSocket - Constructors
// ============================================================================

impl WebSocket {
    /// Connects to `url` over the bundled tungstenite transport.
    ///
    /// Returns immediately in the `CONNECTING` state; progress is reported
    /// through events. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL does not parse, is not `ws`/`wss`,
    ///   or has a fragment
    /// - [`Error::InvalidProtocol`] for an invalid or duplicate sub-protocol
    /// - [`Error::Config`] if there is no current tokio runtime
    pub fn new(url: &str, protocols: impl Into<SubProtocols>) -> Result<Self> {
        Self::with_options(url, protocols, WebSocketOptions::default())
    }

    /// Like [`new`](Self::new), with explicit options.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new), plus [`Error::Config`] for an invalid extra
    /// header.
    pub fn with_options(
        url: &str,
        protocols: impl Into<SubProtocols>,
        options: WebSocketOptions,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("WebSocket requires a tokio runtime: {e}")))?;

        let (url, protocols) = Self::validate(url, protocols.into())?;
        let request = build_request(&url, &protocols, &options.headers)?;
        let WebSocketOptions {
            connect_timeout,
            close_timeout,
            ..
        } = options;

        let (socket, dispatcher) = Self::assemble(url, protocols, |notifier| {
            TungsteniteTransport::connect(
                request,
                connect_timeout,
                close_timeout,
                notifier,
                &runtime,
            )
        });

        runtime.spawn(dispatcher.run());

        Ok(socket)
    }

    /// Wraps a caller-supplied transport.
    ///
    /// `factory` receives the [`Notifier`] the transport must report
    /// through. The returned [`Dispatcher`] is not running; drive it with
    /// [`Dispatcher::run`] or step it by hand.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] / [`Error::InvalidProtocol`] as for
    ///   [`new`](Self::new)
    pub fn with_transport<F, T>(
        url: &str,
        protocols: impl Into<SubProtocols>,
        factory: F,
    ) -> Result<(Self, Dispatcher)>
    where
        F: FnOnce(Notifier) -> T,
        T: Transport + 'static,
    {
        let (url, protocols) = Self::validate(url, protocols.into())?;
        Ok(Self::assemble(url, protocols, factory))
    }

    /// Checks the constructor arguments.
    fn validate(url: &str, protocols: SubProtocols) -> Result<(Url, SubProtocols)> {
        let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e.to_string()))?;

        match parsed.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::invalid_url(
                    url,
                    format!("scheme must be ws or wss, got {other}"),
                ));
            }
        }

        if parsed.fragment().is_some() {
            return Err(Error::invalid_url(url, "fragments are not allowed"));
        }

        protocols.validate()?;

        Ok((parsed, protocols))
    }

    /// Creates the transport, then the socket around it.
    fn assemble<F, T>(url: Url, protocols: SubProtocols, factory: F) -> (Self, Dispatcher)
    where
        F: FnOnce(Notifier) -> T,
        T: Transport + 'static,
    {
        let (notifier, notifications) = Notifier::channel();
        let transport = factory(notifier.clone());
        let id = ConnectionId::new();

        debug!(id = %id, url = %url, protocols = %protocols, "WebSocket created");

        let socket = Self {
            inner: Arc::new(WebSocketInner {
                id,
                url,
                protocols,
                state: Mutex::new(ReadyState::Connecting),
                transport: Box::new(transport),
                notifier,
                targets: Mutex::new(EventTargets::default()),
            }),
        };
        let dispatcher = Dispatcher::new(socket.clone(), notifications);

        (socket, dispatcher)
    }
}

// ============================================================================
// WebSocket - Accessors
// ============================================================================

impl WebSocket {
    /// Returns the connection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the target URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the requested sub-protocols.
    #[inline]
    #[must_use]
    pub fn protocol(&self) -> &SubProtocols {
        &self.inner.protocols
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        *self.inner.state.lock()
    }

    /// Bytes queued but not yet sent.
    ///
    /// Always `0`: payloads go straight to the transport.
    #[inline]
    #[must_use]
    pub fn buffered_amount(&self) -> u64 {
        0
    }

    /// Returns `true` if both handles refer to the same socket.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a handle that does not keep the socket alive.
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakWebSocket {
        WeakWebSocket {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

// ============================================================================
// WebSocket - Legacy Handlers
// ============================================================================

impl WebSocket {
    /// Sets `onopen`.
    pub fn set_onopen<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Open, Some(Arc::new(handler)));
    }

    /// Sets `onclose`.
    pub fn set_onclose<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Close, Some(Arc::new(handler)));
    }

    /// Sets `onmessage`.
    pub fn set_onmessage<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Message, Some(Arc::new(handler)));
    }

    /// Sets `onerror`.
    pub fn set_onerror<F>(&self, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.set_handler(EventKind::Error, Some(Arc::new(handler)));
    }

    /// Replaces the handler slot for `kind`; `None` restores the no-op.
    ///
    /// Ignored once closed for every kind but `error`.
    pub fn set_handler(&self, kind: EventKind, handler: Option<Handler>) {
        let mut targets = self.inner.targets.lock();
        if self.is_released(kind) {
            trace!(id = %self.inner.id, %kind, "Socket closed, handler not retained");
            return;
        }
        targets.handlers.set(kind, handler);
    }

    /// Restores the no-op handler for `kind`.
    pub fn clear_handler(&self, kind: EventKind) {
        self.set_handler(kind, None);
    }

    /// Returns the handler currently in the slot for `kind`.
    #[must_use]
    pub fn handler(&self, kind: EventKind) -> Handler {
        self.inner.targets.lock().handlers.get(kind)
    }
}

// ============================================================================
// WebSocket - Listeners
// ============================================================================

impl WebSocket {
    /// Registers `listener` for `kind`; already-registered listeners are
    /// left where they are.
    ///
    /// Ignored once closed for every kind but `error`.
    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) {
        let mut targets = self.inner.targets.lock();
        if self.is_released(kind) {
            trace!(id = %self.inner.id, %kind, "Socket closed, listener not retained");
            return;
        }
        let added = targets.listeners.add(kind, listener);
        trace!(id = %self.inner.id, %kind, added, "add_event_listener");
    }

    /// Unregisters `listener` from `kind`, if registered.
    pub fn remove_event_listener(&self, kind: EventKind, listener: &Listener) {
        let removed = self.inner.targets.lock().listeners.remove(kind, listener);
        trace!(id = %self.inner.id, %kind, removed, "remove_event_listener");
    }

    /// Like [`add_event_listener`](Self::add_event_listener), by event name.
    ///
    /// Names other than `open`, `close`, `message` and `error` are ignored.
    pub fn add_event_listener_by_name(&self, name: &str, listener: Listener) {
        match name.parse::<EventKind>() {
            Ok(kind) => self.add_event_listener(kind, listener),
            Err(_) => trace!(id = %self.inner.id, name, "Unknown event name ignored"),
        }
    }

    /// Like [`remove_event_listener`](Self::remove_event_listener), by event
    /// name.
    ///
    /// Names other than `open`, `close`, `message` and `error` are ignored.
    pub fn remove_event_listener_by_name(&self, name: &str, listener: &Listener) {
        match name.parse::<EventKind>() {
            Ok(kind) => self.remove_event_listener(kind, listener),
            Err(_) => trace!(id = %self.inner.id, name, "Unknown event name ignored"),
        }
    }

    /// Returns the number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.targets.lock().listeners.len(kind)
    }
}

// ============================================================================
// WebSocket - Operations
// ============================================================================

impl WebSocket {
    /// Hands `data` to the transport.
    ///
    /// Never fails here: a failed transmission is reported later as an
    /// `error` event carrying the transport's error.
    pub fn send(&self, data: impl Into<Data>) {
        let data = data.into();
        trace!(id = %self.inner.id, len = data.len(), "send");

        let notifier = self.inner.notifier.clone();
        self.inner.transport.transmit(
            data,
            Box::new(move |result| {
                if let Err(err) = result {
                    notifier.transmit_failed(err);
                }
            }),
        );
    }

    /// Serializes `value` as JSON and sends it as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails; nothing is sent.
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.send(text);
        Ok(())
    }

    /// Requests the connection to close.
    ///
    /// Closing before the connection opened still produces exactly one
    /// `close` event, dispatched on a later turn of the dispatcher. Closing
    /// an already closed socket does nothing.
    pub fn close(&self) {
        let (action, previous) = {
            let mut state = self.inner.state.lock();
            let previous = *state;
            let action = CloseAction::for_state(previous);
            if let Some(next) = action.next_state() {
                *state = next;
            }
            (action, previous)
        };

        if action.forwards() {
            self.inner.transport.request_close();
        }

        match action {
            CloseAction::Synthesize => {
                debug!(id = %self.inner.id, "Closed before open, close event scheduled");
                self.inner.notifier.synthetic_close();
            }
            CloseAction::Forward => debug!(id = %self.inner.id, "Close requested"),
            CloseAction::Repeat | CloseAction::Ignore => {
                trace!(id = %self.inner.id, state = %previous, "Close repeated");
            }
        }
    }
}

// ============================================================================
// WebSocket - Dispatch
// ============================================================================

impl WebSocket {
    /// Applies one queued notification. Called by the [`Dispatcher`] only.
    pub(crate) fn handle_notification(&self, notification: Notification) {
        match notification {
            Notification::Open => {
                if self.advance(ReadyState::on_open) {
                    debug!(id = %self.inner.id, "WebSocket open");
                    self.dispatch(&Event::Open);
                } else {
                    trace!(id = %self.inner.id, state = %self.ready_state(), "Late open ignored");
                }
            }

            Notification::Close(frame) => {
                if self.advance(ReadyState::on_close) {
                    debug!(id = %self.inner.id, ?frame, "WebSocket closed");
                    self.dispatch(&Event::Close(frame));
                    self.release_targets();
                }
            }

            Notification::SyntheticClose => {
                if self.advance(ReadyState::on_close) {
                    debug!(id = %self.inner.id, "WebSocket closed before open");
                    self.dispatch(&Event::Close(None));
                    self.release_targets();
                }
            }

            Notification::Message(data) => {
                let event = Event::Message(MessageEvent::new(self.clone(), data));
                self.dispatch(&event);
            }

            Notification::Error(err) => {
                debug!(id = %self.inner.id, error = %err, "Transport error");
                self.dispatch(&Event::Error(Arc::new(err)));
            }

            Notification::TransmitFailed(err) => {
                debug!(id = %self.inner.id, error = %err, "Send failed");
                self.dispatch(&Event::Error(Arc::new(err)));
            }
        }
    }

    /// Applies `transition` to the state; returns whether it moved.
    fn advance(&self, transition: impl FnOnce(ReadyState) -> Option<ReadyState>) -> bool {
        let mut state = self.inner.state.lock();
        match transition(*state) {
            Some(next) => {
                *state = next;
                true
            }
            None => false,
        }
    }

    /// Whether callbacks for `kind` are no longer retained.
    ///
    /// Callers hold the targets lock, so a concurrent release cannot slip
    /// between this check and their update.
    fn is_released(&self, kind: EventKind) -> bool {
        !fires_after_close(kind) && self.ready_state() == ReadyState::Closed
    }

    /// Drops callbacks that can no longer fire, after the terminal `close`.
    fn release_targets(&self) {
        let released = self.inner.targets.lock().release_closed();
        trace!(id = %self.inner.id, released, "Callbacks released");
    }

    /// Listeners in registration order, then the legacy handler.
    ///
    /// No lock is held while callbacks run.
    fn dispatch(&self, event: &Event) {
        let kind = event.kind();
        let (listeners, handler) = {
            let targets = self.inner.targets.lock();
            (targets.listeners.snapshot(kind), targets.handlers.get(kind))
        };

        trace!(id = %self.inner.id, %kind, listeners = listeners.len(), "Dispatching");

        for listener in &listeners {
            listener(event);
        }
        handler(event);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use proptest::prelude::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    use crate::event::listener;
    use crate::protocol::{CloseCode, CloseFrame};
    use crate::transport::mock::{self, TEST_URL};

    type Log = Arc<Mutex<Vec<String>>>;

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Listener that appends `tag:kind` to `log`.
    fn record(log: &Log, tag: &'static str) -> Listener {
        let log = Arc::clone(log);
        listener(move |event| log.lock().push(format!("{tag}:{}", event.kind())))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().clone()
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    #[test]
    fn test_initial_state() {
        let (ws, _dispatcher, _transport) =
            mock::connect_with(TEST_URL, ["chat", "superchat"]).expect("valid");

        assert_eq!(ws.ready_state(), WebSocket::CONNECTING);
        assert_eq!(ws.buffered_amount(), 0);
        assert_eq!(ws.url().as_str(), TEST_URL);
        assert_eq!(ws.protocol().as_slice(), ["chat", "superchat"]);
    }

    #[test]
    fn test_state_constants() {
        assert_eq!(WebSocket::CONNECTING.as_u8(), 0);
        assert_eq!(WebSocket::OPEN.as_u8(), 1);
        assert_eq!(WebSocket::CLOSING.as_u8(), 2);
        assert_eq!(WebSocket::CLOSED.as_u8(), 3);
    }

    #[test]
    fn test_rejects_invalid_urls() {
        for url in ["not a url", "http://example.com/", "ws://example.com/#frag"] {
            let err = mock::connect_with(url, SubProtocols::none())
                .err()
                .expect("rejected");
            assert!(matches!(err, Error::InvalidUrl { .. }), "{url}: {err}");
        }
    }

    #[test]
    fn test_accepts_wss() {
        assert!(mock::connect_with("wss://example.com/live", SubProtocols::none()).is_ok());
    }

    #[test]
    fn test_rejects_invalid_protocols() {
        let err = mock::connect_with(TEST_URL, ["a", "a"])
            .err()
            .expect("rejected");
        assert!(matches!(err, Error::InvalidProtocol { .. }));
    }

    #[test]
    fn test_new_requires_runtime() {
        let err = WebSocket::new(TEST_URL, SubProtocols::none()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    // ------------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------------

    #[test]
    fn test_open_notification() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Open, record(&log, "l"));

        transport.open();
        assert_eq!(ws.ready_state(), WebSocket::CONNECTING);

        dispatcher.dispatch_pending();
        assert_eq!(ws.ready_state(), WebSocket::OPEN);
        assert_eq!(entries(&log), ["l:open"]);
    }

    #[test]
    fn test_error_keeps_state() {
        let (ws, mut dispatcher, transport) = mock::connect();

        transport.open();
        transport.error(Error::connection("reset"));
        dispatcher.dispatch_pending();

        assert_eq!(ws.ready_state(), WebSocket::OPEN);
    }

    #[test]
    fn test_close_before_open_synthesizes_once() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Close, record(&log, "l"));
        let handler_log = Arc::clone(&log);
        ws.set_onclose(move |event| {
            assert!(event.close_frame().is_none());
            handler_log.lock().push("h:close".to_owned());
        });

        ws.close();

        // Forwarded, but nothing dispatched before close() returned.
        assert_eq!(transport.close_requests(), 1);
        assert_eq!(ws.ready_state(), WebSocket::CLOSING);
        assert!(entries(&log).is_empty());

        dispatcher.dispatch_pending();
        assert_eq!(ws.ready_state(), WebSocket::CLOSED);
        assert_eq!(entries(&log), ["l:close", "h:close"]);

        ws.close();
        dispatcher.dispatch_pending();
        assert_eq!(entries(&log), ["l:close", "h:close"]);
        assert_eq!(transport.close_requests(), 1);
    }

    #[test]
    fn test_close_before_open_ignores_late_transport_close() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Close, record(&log, "l"));

        ws.close();
        transport.close(Some(CloseFrame::abnormal()));
        dispatcher.dispatch_pending();

        assert_eq!(entries(&log), ["l:close"]);
    }

    #[test]
    fn test_close_before_open_ignores_late_open() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Open, record(&log, "l"));
        ws.add_event_listener(EventKind::Close, record(&log, "l"));

        ws.close();
        transport.open();
        dispatcher.dispatch_pending();

        assert_eq!(ws.ready_state(), WebSocket::CLOSED);
        assert_eq!(entries(&log), ["l:close"]);
    }

    #[test]
    fn test_repeated_close_while_connecting() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Close, record(&log, "l"));

        ws.close();
        ws.close();
        assert_eq!(ws.ready_state(), WebSocket::CLOSING);
        assert_eq!(transport.close_requests(), 2);

        dispatcher.dispatch_pending();
        assert_eq!(entries(&log), ["l:close"]);
    }

    #[test]
    fn test_close_after_open_waits_for_transport() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&frames);
        ws.set_onclose(move |event| seen.lock().push(event.close_frame().cloned()));

        transport.open();
        dispatcher.dispatch_pending();

        ws.close();
        assert_eq!(ws.ready_state(), WebSocket::CLOSING);
        assert_eq!(transport.close_requests(), 1);

        // No synthesis once open.
        assert_eq!(dispatcher.dispatch_pending(), 0);
        assert!(frames.lock().is_empty());

        let frame = CloseFrame::new(CloseCode::NORMAL, "bye");
        transport.close(Some(frame.clone()));
        dispatcher.dispatch_pending();

        assert_eq!(ws.ready_state(), WebSocket::CLOSED);
        assert_eq!(*frames.lock(), [Some(frame)]);
    }

    #[test]
    fn test_transport_close_without_request() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Close, record(&log, "l"));

        transport.open();
        transport.close(None);
        dispatcher.dispatch_pending();

        assert_eq!(ws.ready_state(), WebSocket::CLOSED);
        assert_eq!(entries(&log), ["l:close"]);

        ws.close();
        assert_eq!(transport.close_requests(), 0);
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    #[test]
    fn test_listeners_fire_before_handler() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();

        ws.add_event_listener(EventKind::Open, record(&log, "a"));
        ws.add_event_listener(EventKind::Open, record(&log, "b"));
        let handler_log = Arc::clone(&log);
        ws.set_onopen(move |_| handler_log.lock().push("h:open".to_owned()));

        transport.open();
        dispatcher.dispatch_pending();

        assert_eq!(entries(&log), ["a:open", "b:open", "h:open"]);
    }

    #[test]
    fn test_duplicate_listener_fires_once() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        let l = record(&log, "l");

        ws.add_event_listener(EventKind::Message, l.clone());
        ws.add_event_listener(EventKind::Message, l.clone());
        ws.add_event_listener_by_name("message", l);
        assert_eq!(ws.listener_count(EventKind::Message), 1);

        transport.message("x");
        dispatcher.dispatch_pending();

        assert_eq!(entries(&log), ["l:message"]);
    }

    #[test]
    fn test_removed_listener_not_called() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        let keep = record(&log, "keep");
        let drop_me = record(&log, "drop");

        ws.add_event_listener(EventKind::Error, keep);
        ws.add_event_listener(EventKind::Error, drop_me.clone());
        ws.remove_event_listener(EventKind::Error, &drop_me);
        // Unregistered and wrong-kind removals are no-ops.
        ws.remove_event_listener(EventKind::Error, &drop_me);
        ws.remove_event_listener(EventKind::Open, &record(&log, "never"));

        transport.error(Error::ConnectionClosed);
        dispatcher.dispatch_pending();

        assert_eq!(entries(&log), ["keep:error"]);
    }

    #[test]
    fn test_unknown_event_names_ignored() {
        let (ws, _dispatcher, _transport) = mock::connect();
        let log = new_log();
        let l = record(&log, "l");

        ws.add_event_listener_by_name("ping", l.clone());
        ws.remove_event_listener_by_name("pong", &l);

        for kind in EventKind::ALL {
            assert_eq!(ws.listener_count(kind), 0);
        }
    }

    #[test]
    fn test_remove_by_name() {
        let (ws, _dispatcher, _transport) = mock::connect();
        let l = listener(|_| {});

        ws.add_event_listener_by_name("close", l.clone());
        assert_eq!(ws.listener_count(EventKind::Close), 1);
        ws.remove_event_listener_by_name("close", &l);
        assert_eq!(ws.listener_count(EventKind::Close), 0);
    }

    #[test]
    fn test_handler_assignment_overwrites() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();

        let first = Arc::clone(&log);
        ws.set_onmessage(move |_| first.lock().push("first".to_owned()));
        let second = Arc::clone(&log);
        ws.set_onmessage(move |_| second.lock().push("second".to_owned()));

        transport.message("x");
        dispatcher.dispatch_pending();
        assert_eq!(entries(&log), ["second"]);

        ws.clear_handler(EventKind::Message);
        transport.message("y");
        dispatcher.dispatch_pending();
        assert_eq!(entries(&log), ["second"]);
    }

    #[test]
    fn test_handler_getter_returns_assigned() {
        let (ws, _dispatcher, _transport) = mock::connect();
        let handler: Handler = Arc::new(|_: &Event| {});

        ws.set_handler(EventKind::Error, Some(Arc::clone(&handler)));
        assert!(Arc::ptr_eq(&ws.handler(EventKind::Error), &handler));
    }

    #[test]
    fn test_message_wrapping() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let listener_seen = Arc::clone(&seen);
        let socket = ws.clone();
        ws.add_event_listener(
            EventKind::Message,
            listener(move |event| {
                let message = event.as_message().expect("message event");
                assert_eq!(message.data(), "hello");
                assert_eq!(message.event_type(), "message");
                assert!(message.target().ptr_eq(&socket));
                listener_seen.lock().push(message as *const MessageEvent as usize);
            }),
        );
        let handler_seen = Arc::clone(&seen);
        ws.set_onmessage(move |event| {
            let message = event.as_message().expect("message event");
            handler_seen.lock().push(message as *const MessageEvent as usize);
        });

        transport.message("hello");
        dispatcher.dispatch_pending();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1], "both channels get the same instance");
    }

    #[test]
    fn test_binary_message_passthrough() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let seen = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&seen);
        ws.set_onmessage(move |event| {
            *slot.lock() = event.as_message().map(|m| m.data().clone());
        });

        transport.message(vec![0u8, 255]);
        dispatcher.dispatch_pending();

        assert_eq!(*seen.lock(), Some(Data::Binary(vec![0, 255])));
    }

    #[test]
    fn test_error_passthrough_same_value() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let seen: Arc<Mutex<Vec<Arc<Error>>>> = Arc::new(Mutex::new(Vec::new()));

        let listener_seen = Arc::clone(&seen);
        ws.add_event_listener(
            EventKind::Error,
            listener(move |event| listener_seen.lock().push(Arc::clone(event.as_error().expect("error")))),
        );
        let handler_seen = Arc::clone(&seen);
        ws.set_onerror(move |event| handler_seen.lock().push(Arc::clone(event.as_error().expect("error"))));

        transport.error(Error::connection("reset by peer"));
        dispatcher.dispatch_pending();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(Arc::ptr_eq(&seen[0], &seen[1]));
        assert_eq!(seen[0].to_string(), "Connection failed: reset by peer");
    }

    #[test]
    fn test_listener_mutations_apply_to_next_notification() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        let second = record(&log, "second");

        let socket = ws.clone();
        let victim = second.clone();
        let first_log = Arc::clone(&log);
        ws.add_event_listener(
            EventKind::Message,
            listener(move |_| {
                first_log.lock().push("first:message".to_owned());
                socket.remove_event_listener(EventKind::Message, &victim);
            }),
        );
        ws.add_event_listener(EventKind::Message, second);

        transport.message("1");
        transport.message("2");
        dispatcher.dispatch_pending();

        assert_eq!(
            entries(&log),
            ["first:message", "second:message", "first:message"]
        );
    }

    #[test]
    fn test_close_from_open_handler() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let socket = ws.clone();
        ws.set_onopen(move |_| socket.close());

        transport.open();
        dispatcher.dispatch_pending();

        assert_eq!(ws.ready_state(), WebSocket::CLOSING);
        assert_eq!(transport.close_requests(), 1);
    }

    // ------------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------------

    #[test]
    fn test_send_forwards_verbatim() {
        let (ws, _dispatcher, transport) = mock::connect();

        ws.send("text");
        ws.send(vec![1u8, 2]);
        ws.send("");

        assert_eq!(
            transport.transmitted(),
            [
                Data::from("text"),
                Data::Binary(vec![1, 2]),
                Data::from("")
            ]
        );
    }

    #[test]
    fn test_send_failure_reaches_both_channels() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let seen: Arc<Mutex<Vec<Arc<Error>>>> = Arc::new(Mutex::new(Vec::new()));

        let listener_seen = Arc::clone(&seen);
        ws.add_event_listener(
            EventKind::Error,
            listener(move |event| listener_seen.lock().push(Arc::clone(event.as_error().expect("error")))),
        );
        let handler_seen = Arc::clone(&seen);
        ws.set_onerror(move |event| handler_seen.lock().push(Arc::clone(event.as_error().expect("error"))));

        transport.open();
        dispatcher.dispatch_pending();

        ws.send("payload");
        assert!(transport.complete_next(Err(Error::ConnectionClosed)));
        dispatcher.dispatch_pending();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(*seen[0], Error::ConnectionClosed));
        assert!(Arc::ptr_eq(&seen[0], &seen[1]), "both channels get the same error");
        assert_eq!(ws.ready_state(), WebSocket::OPEN);
    }

    #[test]
    fn test_send_after_close_reports_error() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Error, record(&log, "l"));
        let handler_log = Arc::clone(&log);
        ws.set_onerror(move |_| handler_log.lock().push("h:error".to_owned()));

        transport.open();
        transport.close(None);
        dispatcher.dispatch_pending();
        assert_eq!(ws.ready_state(), WebSocket::CLOSED);

        ws.send("late");
        assert!(transport.complete_next(Err(Error::ConnectionClosed)));
        transport.error(Error::connection("reset"));
        assert_eq!(dispatcher.dispatch_pending(), 2);

        assert_eq!(entries(&log), ["l:error", "h:error", "l:error", "h:error"]);
        assert_eq!(ws.ready_state(), WebSocket::CLOSED);
    }

    #[test]
    fn test_send_success_is_silent() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let log = new_log();
        ws.add_event_listener(EventKind::Error, record(&log, "l"));

        ws.send("payload");
        assert!(transport.complete_next(Ok(())));
        dispatcher.dispatch_pending();

        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_send_json() {
        let (ws, _dispatcher, transport) = mock::connect();

        ws.send_json(&serde_json::json!({ "op": "subscribe" }))
            .expect("serializable");

        assert_eq!(
            transport.transmitted(),
            [Data::from(r#"{"op":"subscribe"}"#)]
        );
    }

    // ------------------------------------------------------------------------
    // Lifetime
    // ------------------------------------------------------------------------

    #[test]
    fn test_closed_socket_is_freed_despite_captured_clones() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let inner = Arc::downgrade(&ws.inner);

        let sender = ws.clone();
        ws.set_onopen(move |_| sender.send("hello"));
        let closer = ws.clone();
        ws.add_event_listener(EventKind::Message, listener(move |_| closer.close()));
        let observer = ws.clone();
        ws.set_onclose(move |_| assert_eq!(observer.ready_state(), WebSocket::CLOSED));

        transport.open();
        transport.message("bye");
        dispatcher.dispatch_pending();
        transport.close(Some(CloseFrame::new(CloseCode::NORMAL, "")));
        dispatcher.dispatch_pending();

        assert_eq!(ws.listener_count(EventKind::Message), 0);
        drop(ws);
        assert_eq!(inner.strong_count(), 0);
        assert!(dispatcher.socket().is_none());
    }

    #[test]
    fn test_closed_before_open_socket_is_freed() {
        let (ws, mut dispatcher, _transport) = mock::connect();
        let inner = Arc::downgrade(&ws.inner);

        let observer = ws.clone();
        ws.set_onclose(move |_| assert_eq!(observer.ready_state(), WebSocket::CLOSED));

        ws.close();
        dispatcher.dispatch_pending();
        drop(ws);
        drop(dispatcher);

        assert_eq!(inner.strong_count(), 0);
    }

    #[test]
    fn test_late_registrations_not_retained() {
        let (ws, mut dispatcher, transport) = mock::connect();
        transport.open();
        transport.close(None);
        dispatcher.dispatch_pending();

        let captured = ws.clone();
        ws.set_onmessage(move |_| captured.send("never"));
        ws.add_event_listener(EventKind::Open, listener(|_| {}));
        ws.add_event_listener(EventKind::Error, listener(|_| {}));

        assert_eq!(ws.listener_count(EventKind::Open), 0);
        assert_eq!(ws.listener_count(EventKind::Error), 1);
        assert_eq!(Arc::strong_count(&ws.inner), 1);
    }

    #[test]
    fn test_weak_handle_in_error_callback() {
        let (ws, mut dispatcher, transport) = mock::connect();
        let inner = Arc::downgrade(&ws.inner);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = ws.downgrade();
        let states = Arc::clone(&seen);
        ws.set_onerror(move |_| {
            if let Some(ws) = weak.upgrade() {
                states.lock().push(ws.ready_state());
            }
        });

        transport.open();
        transport.error(Error::ConnectionClosed);
        transport.close(None);
        dispatcher.dispatch_pending();

        assert_eq!(*seen.lock(), [WebSocket::OPEN]);
        drop(ws);
        assert_eq!(inner.strong_count(), 0);
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Op {
        Open,
        Close,
        Message,
        Error,
        CloseRequest,
        Pump,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Open),
            Just(Op::Close),
            Just(Op::Message),
            Just(Op::Error),
            Just(Op::CloseRequest),
            Just(Op::Pump),
        ]
    }

    proptest! {
        #[test]
        fn prop_state_is_monotonic(ops in prop::collection::vec(op(), 0..40)) {
            let (ws, mut dispatcher, transport) = mock::connect();
            let closes = Arc::new(Mutex::new(0usize));
            let counter = Arc::clone(&closes);
            ws.add_event_listener(EventKind::Close, listener(move |_| *counter.lock() += 1));

            let mut last = ws.ready_state();
            for op in ops {
                match op {
                    Op::Open => transport.open(),
                    Op::Close => transport.close(None),
                    Op::Message => transport.message("m"),
                    Op::Error => transport.error(Error::ConnectionClosed),
                    Op::CloseRequest => ws.close(),
                    Op::Pump => {
                        dispatcher.dispatch_pending();
                    }
                }
                let now = ws.ready_state();
                prop_assert!(now >= last, "{last} -> {now}");
                last = now;
            }
            dispatcher.dispatch_pending();

            let closes = *closes.lock();
            prop_assert!(closes <= 1);
            prop_assert_eq!(closes == 1, ws.ready_state() == WebSocket::CLOSED);
        }
    }

    // ------------------------------------------------------------------------
    // End to end over tungstenite
    // ------------------------------------------------------------------------

    async fn spawn_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(message)) = ws.next().await {
                        if (message.is_text() || message.is_binary())
                            && ws.send(message).await.is_err()
                        {
                            break;
                        }
                    }
                });
            }
        });

        addr
    }

    /// Forwards `kind` (plus text payloads) into a channel.
    fn forward_events(ws: &WebSocket) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in EventKind::ALL {
            let tx = tx.clone();
            ws.add_event_listener(
                kind,
                listener(move |event| {
                    let entry = match event {
                        Event::Message(message) => {
                            format!("message:{}", message.data().as_text().unwrap_or_default())
                        }
                        other => other.kind().to_string(),
                    };
                    let _ = tx.send(entry);
                }),
            );
        }
        rx
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let addr = spawn_echo_server().await;
        let ws = WebSocket::new(&format!("ws://{addr}/"), SubProtocols::none()).expect("valid");
        let mut events = forward_events(&ws);

        let sender = ws.clone();
        ws.set_onopen(move |_| sender.send("hello"));
        let closer = ws.clone();
        ws.set_onmessage(move |_| closer.close());

        assert_eq!(next_event(&mut events).await, "open");
        assert_eq!(next_event(&mut events).await, "message:hello");
        assert_eq!(next_event(&mut events).await, "close");
        assert_eq!(ws.ready_state(), WebSocket::CLOSED);
    }

    #[tokio::test]
    async fn test_close_before_open_over_network() {
        let addr = spawn_echo_server().await;
        let ws = WebSocket::new(&format!("ws://{addr}/"), SubProtocols::none()).expect("valid");
        let mut events = forward_events(&ws);

        ws.close();
        assert_eq!(ws.ready_state(), WebSocket::CLOSING);

        assert_eq!(next_event(&mut events).await, "close");
        sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err(), "exactly one close");
        assert_eq!(ws.ready_state(), WebSocket::CLOSED);
    }

    #[tokio::test]
    async fn test_refused_connection_errors_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let ws = WebSocket::new(&format!("ws://{addr}/"), SubProtocols::none()).expect("valid");
        let mut events = forward_events(&ws);

        assert_eq!(next_event(&mut events).await, "error");
        assert_eq!(next_event(&mut events).await, "close");
    }
}
