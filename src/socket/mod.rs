//! The WebSocket facade.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WebSocket`] | Browser-style handle over one transport |
//! | [`Dispatcher`] | Single consumer of the socket's notification queue |
//! | [`ReadyState`] | `CONNECTING` / `OPEN` / `CLOSING` / `CLOSED` |
//! | [`WebSocketOptions`] | Handshake settings for the bundled transport |
//!
//! # Example
//!
//! ```no_run
//! use websocket_compat::{SubProtocols, WebSocket};
//!
//! # async fn example() -> websocket_compat::Result<()> {
//! let ws = WebSocket::new("wss://example.com/feed", SubProtocols::none())?;
//!
//! let sender = ws.clone();
//! ws.set_onopen(move |_| sender.send("subscribe"));
//! ws.set_onclose(|event| println!("closed: {:?}", event.close_frame()));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// `WebSocket` handle, operations and dispatch.
pub mod core;

/// Notification pump.
pub mod dispatcher;

/// Connection options.
pub mod options;

/// Ready state machine.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{WeakWebSocket, WebSocket};
pub use dispatcher::Dispatcher;
pub use options::{DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, WebSocketOptions};
pub use state::ReadyState;
