//! Connection options.
//!
//! Settings for the bundled tungstenite transport. Sub-protocols are not an
//! option: they are a constructor argument, as in the browser API.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use websocket_compat::WebSocketOptions;
//!
//! let options = WebSocketOptions::new()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_close_timeout(Duration::from_secs(2))
//!     .with_header("Authorization", "Bearer token");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for the peer's reply to our close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// WebSocketOptions
// ============================================================================

/// Options for [`WebSocket::with_options`](crate::WebSocket::with_options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketOptions {
    /// Handshake timeout; `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,

    /// Close handshake timeout; on expiry the connection is dropped and
    /// the close is reported abnormal. `None` waits indefinitely.
    pub close_timeout: Option<Duration>,

    /// Extra handshake headers, sent in order.
    pub headers: Vec<(String, String)>,
}

impl Default for WebSocketOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl WebSocketOptions {
    /// Creates options with the default timeouts and no extra headers.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            close_timeout: Some(DEFAULT_CLOSE_TIMEOUT),
            headers: Vec::new(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl WebSocketOptions {
    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables the handshake timeout.
    #[inline]
    #[must_use]
    pub fn without_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Sets the close handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = Some(timeout);
        self
    }

    /// Disables the close handshake timeout.
    #[inline]
    #[must_use]
    pub fn without_close_timeout(mut self) -> Self {
        self.close_timeout = None;
        self
    }

    /// Adds a handshake header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds multiple handshake headers.
    #[inline]
    #[must_use]
    pub fn with_headers<N, V>(mut self, headers: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(n, v)| (n.into(), v.into())));
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
