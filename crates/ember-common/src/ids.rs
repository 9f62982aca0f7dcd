//! ID types for dispatchers and listener connections.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for dispatcher IDs.
static DISPATCHER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Global counter for listener connection IDs.
static LISTENER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a dispatcher.
///
/// The ID stays usable as a bookkeeping key after the dispatcher itself is
/// gone, which is what lets subscribers answer queries about a destroyed
/// dispatcher without holding a reference to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatcherId(u64);

impl DispatcherId {
    /// Creates a new unique dispatcher ID.
    #[must_use]
    pub fn new() -> Self {
        Self(DISPATCHER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a dispatcher ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid dispatcher ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) dispatcher ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for DispatcherId {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection handle identifying a single listener registration.
///
/// Handed out by listener registration and used to disconnect later.
/// Disconnecting an already-removed handle is a valid no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Creates a new unique listener ID.
    #[must_use]
    pub fn new() -> Self {
        Self(LISTENER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a listener ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid listener ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) listener ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}
