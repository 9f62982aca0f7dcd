//! # Ember Events
//!
//! In-process event dispatch core for Project Ember. Every subsystem (engine
//! loop, input, filesystem, UI, plugins) publishes and consumes state
//! changes through this crate:
//! - Typed publish/subscribe dispatcher with priority ordering and
//!   cooperative short-circuit propagation
//! - Subscription tracking capability that survives dispatcher destruction
//! - Bounded thread-safe queue for deferred delivery and cross-thread handoff
//!
//! The dispatch path (dispatcher plus subscriber capability) is
//! single-threaded by contract; only [`BoundedQueue`] is safe under
//! concurrent access.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod dispatcher;
pub mod event;
pub mod queue;
pub mod subscriber;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dispatcher::{Dispatcher, ListenerFn, WeakDispatcher};
    pub use crate::event::{DispatcherTeardown, Event, FORCE_UNSUBSCRIBE};
    pub use crate::queue::{BoundedQueue, DEFAULT_QUEUE_CAPACITY};
    pub use crate::subscriber::{
        Delivery, EventSubscriptions, HandlerToken, Subscriber,
    };
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone)]
    struct Resized {
        width: u32,
        height: u32,
    }

    impl Event for Resized {
        fn event_type(&self) -> &str {
            "window.resized"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn clone_event(&self) -> Box<dyn Event> {
            Box::new(self.clone())
        }
    }

    struct Panel {
        subscriptions: EventSubscriptions,
        area: Rc<Cell<u64>>,
    }

    impl Panel {
        fn new(dispatcher: &Dispatcher) -> Self {
            let subscriptions = EventSubscriptions::new();
            let area = Rc::new(Cell::new(0));
            let sink = Rc::clone(&area);
            subscriptions.subscribe(dispatcher, "window.resized", "panel.on_resize", {
                move |event| {
                    if let Some(resized) = event.as_any().downcast_ref::<Resized>() {
                        sink.set(u64::from(resized.width) * u64::from(resized.height));
                    }
                    true
                }
            });
            Self {
                subscriptions,
                area,
            }
        }
    }

    impl Subscriber for Panel {
        fn subscriptions(&self) -> &EventSubscriptions {
            &self.subscriptions
        }
    }

    #[test]
    fn test_component_receives_typed_payload() {
        let dispatcher = Dispatcher::new();
        let panel = Panel::new(&dispatcher);

        dispatcher.fire(&Resized {
            width: 1280,
            height: 720,
        });
        assert_eq!(panel.area.get(), 1280 * 720);
    }

    #[test]
    fn test_component_outlives_dispatcher() {
        let panel;
        let id;
        {
            let dispatcher = Dispatcher::new();
            id = dispatcher.id();
            panel = Panel::new(&dispatcher);
            dispatcher.fire(&Resized {
                width: 100,
                height: 100,
            });
        }
        // Dispatcher is gone; the panel is still fully usable.
        assert_eq!(panel.area.get(), 100 * 100);
        assert!(!panel.subscriptions().has_subscription(id, "window.resized"));
        assert_eq!(panel.flush_deferred(), 0);
    }
}
