//! Requested sub-protocol list.
//!
//! Callers may pass a single name or a sequence of names, mirroring the
//! browser constructor's `protocols` argument. Names are validated once,
//! at construction, as RFC 7230 tokens without duplicates.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// SubProtocols
// ============================================================================

/// Ordered list of requested sub-protocol names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubProtocols(Vec<String>);

impl SubProtocols {
    /// Creates an empty list (no sub-protocol requested).
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` if no sub-protocol was requested.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of requested sub-protocols.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the names in request order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterates over the names in request order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns `true` if `name` was requested.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.iter().any(|p| p == name)
    }

    /// Value for the `Sec-WebSocket-Protocol` handshake header.
    ///
    /// Returns `None` when no sub-protocol was requested.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.0.join(", "))
        }
    }

    /// Checks every name is a non-empty token and that no name repeats.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProtocol`] naming the first offending entry.
    pub fn validate(&self) -> Result<()> {
        let mut seen = FxHashSet::default();

        for name in &self.0 {
            if name.is_empty() {
                return Err(Error::invalid_protocol(name, "empty sub-protocol name"));
            }
            if let Some(c) = name.chars().find(|c| !is_token_char(*c)) {
                return Err(Error::invalid_protocol(
                    name,
                    format!("invalid character {c:?}"),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::invalid_protocol(name, "duplicate sub-protocol name"));
            }
        }

        Ok(())
    }
}

/// RFC 7230 `tchar`.
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&str> for SubProtocols {
    fn from(name: &str) -> Self {
        Self(vec![name.to_owned()])
    }
}

impl From<String> for SubProtocols {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for SubProtocols {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for SubProtocols {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_owned).collect())
    }
}

impl From<&[&str]> for SubProtocols {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| (*n).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for SubProtocols {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| (*n).to_owned()).collect())
    }
}

impl<T: Into<SubProtocols>> From<Option<T>> for SubProtocols {
    fn from(names: Option<T>) -> Self {
        names.map(Into::into).unwrap_or_default()
    }
}

impl fmt::Display for SubProtocols {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

// ============================================================================
// Tests
// ============================================================================
