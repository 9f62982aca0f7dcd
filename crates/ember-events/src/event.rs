//! Event trait and the reserved teardown sentinel.

use std::any::Any;

use ember_common::DispatcherId;

/// Reserved event type fired by a dispatcher while it is tearing down.
///
/// The subscriber capability attaches its own handler to this type; it is the
/// mechanism that keeps subscriber bookkeeping from dangling when a dispatcher
/// is destroyed first. Application code must never fire this type manually nor
/// subscribe to it directly.
pub const FORCE_UNSUBSCRIBE: &str = "__ember.force_unsubscribe";

/// A typed notification routed through a dispatcher.
///
/// Events are immutable values: constructed by the firer, passed by reference
/// through the whole synchronous dispatch chain, and gone when `fire` returns.
/// Deferred delivery captures the event by value via [`Event::clone_event`]
/// because the original reference does not outlive the dispatch.
pub trait Event: Any {
    /// Event type identifier used for listener lookup.
    fn event_type(&self) -> &str;

    /// Upcast used by handlers to downcast to the concrete payload.
    fn as_any(&self) -> &dyn Any;

    /// Clones the event for deferred delivery.
    fn clone_event(&self) -> Box<dyn Event>;
}

/// Payload of the [`FORCE_UNSUBSCRIBE`] sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherTeardown {
    /// Identity of the dispatcher being destroyed
    pub dispatcher: DispatcherId,
}

impl DispatcherTeardown {
    /// Creates a teardown event for the given dispatcher.
    #[must_use]
    pub const fn new(dispatcher: DispatcherId) -> Self {
        Self { dispatcher }
    }
}

impl Event for DispatcherTeardown {
    fn event_type(&self) -> &str {
        FORCE_UNSUBSCRIBE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(*self)
    }
}
