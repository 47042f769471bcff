//! WebSocket Compat - Browser-compatible WebSocket facade.
//!
//! This library exposes the browser `WebSocket` API (`readyState`, `send`,
//! `close`, `addEventListener`, `onmessage`, ...) on top of a pluggable
//! transport. A `tokio-tungstenite` transport is bundled.
//!
//! # Architecture
//!
//! The facade and the transport talk through a notification queue:
//!
//! - **Facade**: owns the ready state, the listeners and the legacy handlers
//! - **Transport**: does the I/O, reports through a [`Notifier`]
//! - **Dispatcher**: drains the queue and delivers events one at a time
//!
//! Key guarantees:
//!
//! - State only moves forward: `CONNECTING → OPEN → CLOSING → CLOSED`
//! - Exactly one `close` event per socket, even when closed before open
//! - Listeners run in registration order, then the legacy handler
//! - No event is ever dispatched from inside `send` or `close`
//!
//! # Quick Start
//!
//! ```no_run
//! use websocket_compat::{Event, EventKind, Result, WebSocket, listener};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ws = WebSocket::new("ws://127.0.0.1:9001/echo", ["chat"])?;
//!
//!     let sender = ws.clone();
//!     ws.set_onopen(move |_| sender.send("hello"));
//!
//!     ws.add_event_listener(
//!         EventKind::Message,
//!         listener(|event| {
//!             if let Event::Message(message) = event {
//!                 println!("received: {:?}", message.data());
//!             }
//!         }),
//!     );
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     ws.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`socket`] | [`WebSocket`], [`Dispatcher`], [`ReadyState`] |
//! | [`event`] | [`Event`], [`EventKind`], [`MessageEvent`], listeners |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Payloads, close frames, sub-protocols |
//! | [`transport`] | [`Transport`] trait and the tungstenite transport |
//!
//! # Features
//!
//! - **`native-tls`**: `wss://` through the platform TLS stack

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Events, listeners and legacy handlers.
pub mod event;

/// Type-safe identifiers.
pub mod identifiers;

/// Payload and handshake types.
pub mod protocol;

/// The WebSocket facade.
///
/// - [`WebSocket`] - Browser-style socket handle
/// - [`Dispatcher`] - Event loop for one socket
pub mod socket;

/// Transport seam.
///
/// Implement [`Transport`] to put the facade over another connection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Socket types
pub use socket::{
    DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, Dispatcher, ReadyState, WeakWebSocket, WebSocket,
    WebSocketOptions,
};

// Event types
pub use event::{Event, EventKind, Handler, Listener, MessageEvent, listener};

// Protocol types
pub use protocol::{CloseCode, CloseFrame, Data, SubProtocols};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Transport types
pub use transport::{Completion, Notifier, Transport, TungsteniteTransport};
