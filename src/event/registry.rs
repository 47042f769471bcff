//! Listener registry and legacy handler slots.
//!
//! The two dispatch channels are separate structures:
//! a legacy slot holds one handler and assignment replaces it, while the
//! registry holds an ordered, duplicate-free list per kind whose entries are
//! added and removed individually.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{EventKind, Handler, Listener, noop};

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Ordered, deduplicated listeners per event kind.
#[derive(Default, Clone)]
pub struct ListenerRegistry {
    listeners: FxHashMap<EventKind, Vec<Listener>>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` for `kind` unless it is already registered.
    ///
    /// Returns `true` if the listener was added.
    pub fn add(&mut self, kind: EventKind, listener: Listener) -> bool {
        let entries = self.listeners.entry(kind).or_default();
        if entries.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        entries.push(listener);
        true
    }

    /// Removes `listener` from `kind`.
    ///
    /// Returns `true` if it was registered.
    pub fn remove(&mut self, kind: EventKind, listener: &Listener) -> bool {
        let Some(entries) = self.listeners.get_mut(&kind) else {
            return false;
        };
        match entries.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drops every listener for `kind`; returns how many there were.
    pub fn clear(&mut self, kind: EventKind) -> usize {
        self.listeners.remove(&kind).map_or(0, |entries| entries.len())
    }

    /// Returns `true` if `listener` is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: EventKind, listener: &Listener) -> bool {
        self.listeners
            .get(&kind)
            .is_some_and(|entries| entries.iter().any(|l| Arc::ptr_eq(l, listener)))
    }

    /// Returns the number of listeners registered for `kind`.
    #[must_use]
    pub fn len(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Returns `true` if no listener is registered for any kind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.values().all(Vec::is_empty)
    }

    /// Copies out the listeners for `kind`, in registration order.
    ///
    /// Dispatch runs over the copy so listeners can mutate the registry.
    #[must_use]
    pub fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.listeners.get(&kind).cloned().unwrap_or_default()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind.as_str(), &self.len(kind));
        }
        map.finish()
    }
}

// ============================================================================
// LegacyHandlers
// ============================================================================

/// The four single-slot handlers, each defaulting to a no-op.
#[derive(Clone)]
pub struct LegacyHandlers {
    onopen: Handler,
    onclose: Handler,
    onmessage: Handler,
    onerror: Handler,
}

impl Default for LegacyHandlers {
    fn default() -> Self {
        Self {
            onopen: noop(),
            onclose: noop(),
            onmessage: noop(),
            onerror: noop(),
        }
    }
}

impl LegacyHandlers {
    /// Creates a set of no-op handlers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handler in the slot for `kind`.
    #[must_use]
    pub fn get(&self, kind: EventKind) -> Handler {
        Arc::clone(self.slot(kind))
    }

    /// Replaces the handler for `kind`; `None` restores the no-op.
    pub fn set(&mut self, kind: EventKind, handler: Option<Handler>) {
        *self.slot_mut(kind) = handler.unwrap_or_else(noop);
    }

    fn slot(&self, kind: EventKind) -> &Handler {
        match kind {
            EventKind::Open => &self.onopen,
            EventKind::Close => &self.onclose,
            EventKind::Message => &self.onmessage,
            EventKind::Error => &self.onerror,
        }
    }

    fn slot_mut(&mut self, kind: EventKind) -> &mut Handler {
        match kind {
            EventKind::Open => &mut self.onopen,
            EventKind::Close => &mut self.onclose,
            EventKind::Message => &mut self.onmessage,
            EventKind::Error => &mut self.onerror,
        }
    }
}

impl fmt::Debug for LegacyHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyHandlers").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
