//! Values exchanged between the facade and its transport.
//!
//! The facade never frames or parses anything itself: payloads are opaque
//! [`Data`] values, close frames are passed through, and the sub-protocol
//! list is only validated and forwarded to the handshake.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `data` | [`Data`] payloads, [`CloseFrame`] and [`CloseCode`] |
//! | `subprotocol` | [`SubProtocols`] requested at construction |

// ============================================================================
// Submodules
// ============================================================================

/// Payload and close-frame types.
pub mod data;

/// Requested sub-protocol list.
pub mod subprotocol;

// ============================================================================
// Re-exports
// ============================================================================

pub use data::{CloseCode, CloseFrame, Data};
pub use subprotocol::SubProtocols;
