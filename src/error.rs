//! Error types for the WebSocket facade.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Construction problems are returned synchronously from the constructors.
//! Everything that goes wrong after construction (transport failures,
//! failed sends) is delivered through the `error` event instead:
//!
//! ```ignore
//! use websocket_compat::{Result, WebSocket};
//!
//! fn example() -> Result<()> {
//!     let ws = WebSocket::new("ws://127.0.0.1:9001", "chat")?;
//!     ws.set_onerror(|event| eprintln!("socket error: {event:?}"));
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Construction | [`Error::InvalidUrl`], [`Error::InvalidProtocol`], [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | State | [`Error::InvalidState`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Construction Errors
    // ========================================================================
    /// Target URL rejected at construction.
    ///
    /// Returned when the URL does not parse, uses a scheme other than
    /// `ws`/`wss`, or carries a fragment.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The URL as given by the caller.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// Sub-protocol name rejected at construction.
    ///
    /// Returned for empty names, names with non-token characters and
    /// duplicates.
    #[error("Invalid sub-protocol '{protocol}': {message}")]
    InvalidProtocol {
        /// The offending sub-protocol name.
        protocol: String,
        /// Why it was rejected.
        message: String,
    },

    /// Configuration error.
    ///
    /// Returned when options are invalid or no runtime is available.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Handshake did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection is closed or closing.
    ///
    /// Reported for sends issued after a close request.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // State Errors
    // ========================================================================
    /// Operation not valid in the current connection state.
    ///
    /// Reported for sends issued before the connection is open.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the state violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid sub-protocol error.
    #[inline]
    pub fn invalid_protocol(protocol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProtocol {
            protocol: protocol.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is raised synchronously at construction.
    #[inline]
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. } | Self::InvalidProtocol { .. } | Self::Config { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
