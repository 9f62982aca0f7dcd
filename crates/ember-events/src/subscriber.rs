//! Subscription tracking capability for event consumers.
//!
//! Any component gains dispatcher subscriptions by composing
//! [`EventSubscriptions`] as a field. The capability tracks every binding it
//! owns across any number of dispatchers, supports immediate and deferred
//! delivery, and survives dispatcher destruction without dangling handles:
//! the first subscription to a dispatcher attaches a teardown handler to the
//! reserved [`FORCE_UNSUBSCRIBE`] sentinel, and that handler purges the
//! dispatcher's bookkeeping when the sentinel fires mid-destruction.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, info, warn};

use ember_common::{DispatcherId, ListenerId};

use crate::dispatcher::{Dispatcher, WeakDispatcher};
use crate::event::{Event, FORCE_UNSUBSCRIBE};
use crate::queue::{BoundedQueue, DEFAULT_QUEUE_CAPACITY};

/// Stable identity for a registered handler.
///
/// Closures cannot be compared, so duplicate detection keys on a
/// caller-supplied name instead. Names only need to be unique within one
/// subscriber instance for a given dispatcher and event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(&'static str);

impl HandlerToken {
    /// Creates a token from a stable handler name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the handler name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl From<&'static str> for HandlerToken {
    fn from(name: &'static str) -> Self {
        Self(name)
    }
}

/// How a subscription's handler runs relative to `fire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Inline during `fire`; the handler's return value controls propagation
    #[default]
    Immediate,
    /// Queued for a later [`EventSubscriptions::flush`]; never interrupts
    /// propagation to other listeners
    Deferred,
}

/// A queued deferred invocation: the captured event plus its handler.
struct DeferredCall {
    event: Box<dyn Event>,
    handler: Rc<dyn Fn(&dyn Event) -> bool>,
}

impl DeferredCall {
    /// Invokes the handler with the captured event. Propagation is long over
    /// by the time a deferred call runs, so the result is discarded.
    fn invoke(self) {
        let _ = (*self.handler)(self.event.as_ref());
    }
}

/// One tracked handler registration.
struct HandlerDescriptor {
    /// Duplicate-detection identity
    token: HandlerToken,
    /// Connection handle held at the dispatcher
    handle: ListenerId,
}

/// Per-dispatcher teardown bookkeeping.
struct DispatcherLink {
    /// Non-owning handle used for explicit disconnects
    dispatcher: WeakDispatcher,
    /// Connection handle of the sentinel subscription
    teardown_handle: ListenerId,
}

#[derive(Default)]
struct SubscriptionState {
    /// (dispatcher identity, event type) -> descriptors owned there
    entries: AHashMap<(DispatcherId, String), Vec<HandlerDescriptor>>,
    /// Dispatchers this subscriber has a teardown handler on
    links: AHashMap<DispatcherId, DispatcherLink>,
}

impl SubscriptionState {
    /// Drops all bookkeeping that references `dispatcher` without calling
    /// back into it. The dispatcher is mid-destruction when this runs, so
    /// touching it again is off limits.
    fn purge(&mut self, dispatcher: DispatcherId) -> usize {
        let before: usize = self.entries.values().map(Vec::len).sum();
        self.entries.retain(|(id, _), _| *id != dispatcher);
        self.links.remove(&dispatcher);
        let after: usize = self.entries.values().map(Vec::len).sum();
        before - after
    }

    fn has_entries_for(&self, dispatcher: DispatcherId) -> bool {
        self.entries.keys().any(|(id, _)| *id == dispatcher)
    }
}

/// Subscription bookkeeping composed into a consumer component.
///
/// Tracks handler registrations per `(dispatcher, event type)` pair across
/// any number of independent dispatchers. Dropping the capability
/// disconnects every live registration, so a dispatcher never retains a
/// connection into a destroyed subscriber; the reverse direction is covered
/// by the teardown sentinel.
///
/// Single-threaded by contract, like the dispatch path it builds on.
pub struct EventSubscriptions {
    state: Rc<RefCell<SubscriptionState>>,
    deferred: Rc<BoundedQueue<DeferredCall>>,
}

impl Default for EventSubscriptions {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriptions {
    /// Creates a capability with the default deferred-queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a capability whose deferred queue holds `capacity` thunks.
    #[must_use]
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(SubscriptionState::default())),
            deferred: Rc::new(BoundedQueue::new(capacity)),
        }
    }

    /// Subscribes `handler` to `event_type` on `dispatcher` with priority 0
    /// and immediate delivery. See [`EventSubscriptions::subscribe_with`].
    pub fn subscribe<F>(
        &self,
        dispatcher: &Dispatcher,
        event_type: &str,
        token: impl Into<HandlerToken>,
        handler: F,
    ) -> bool
    where
        F: Fn(&dyn Event) -> bool + 'static,
    {
        self.subscribe_with(dispatcher, event_type, token, handler, 0, Delivery::Immediate)
    }

    /// Subscribes `handler` to `event_type` on `dispatcher`.
    ///
    /// Returns `false` without registering anything if this capability
    /// already holds a subscription for the same dispatcher, event type, and
    /// token. The first subscription to a given dispatcher also attaches the
    /// teardown handler for the [`FORCE_UNSUBSCRIBE`] sentinel, before the
    /// requested registration, so teardown bookkeeping can never miss a
    /// dispatcher with live subscriptions.
    ///
    /// Deferred handlers are wrapped in a trampoline that captures the event
    /// by value onto this capability's queue and unconditionally reports
    /// `true` to the dispatcher, so a deferred subscription can never stop
    /// propagation to other listeners.
    pub fn subscribe_with<F>(
        &self,
        dispatcher: &Dispatcher,
        event_type: &str,
        token: impl Into<HandlerToken>,
        handler: F,
        priority: i32,
        delivery: Delivery,
    ) -> bool
    where
        F: Fn(&dyn Event) -> bool + 'static,
    {
        let token = token.into();
        let key = (dispatcher.id(), event_type.to_owned());
        {
            let state = self.state.borrow();
            let duplicate = state
                .entries
                .get(&key)
                .is_some_and(|descriptors| descriptors.iter().any(|d| d.token == token));
            if duplicate {
                debug!(
                    event_type,
                    token = token.name(),
                    "duplicate subscription ignored"
                );
                return false;
            }
        }

        self.ensure_teardown_link(dispatcher);

        let handler: Rc<dyn Fn(&dyn Event) -> bool> = Rc::new(handler);
        let handle = match delivery {
            Delivery::Immediate => {
                let handler = Rc::clone(&handler);
                dispatcher.add_listener(event_type, move |event| (*handler)(event), priority)
            }
            Delivery::Deferred => {
                let handler = Rc::clone(&handler);
                let queue = Rc::clone(&self.deferred);
                dispatcher.add_listener(
                    event_type,
                    move |event| {
                        queue.push(DeferredCall {
                            event: event.clone_event(),
                            handler: Rc::clone(&handler),
                        });
                        true
                    },
                    priority,
                )
            }
        };

        self.state
            .borrow_mut()
            .entries
            .entry(key)
            .or_default()
            .push(HandlerDescriptor { token, handle });
        true
    }

    /// Removes the subscription identified by `(dispatcher, event_type,
    /// token)` and disconnects it.
    ///
    /// When the last real subscription to a dispatcher goes away, the
    /// teardown handler on that dispatcher is removed as well, mirroring its
    /// registration on first subscribe. Returns `false` if no matching
    /// subscription exists; that usually means a bookkeeping bug at the call
    /// site, so it is logged.
    pub fn unsubscribe(
        &self,
        dispatcher: DispatcherId,
        event_type: &str,
        token: impl Into<HandlerToken>,
    ) -> bool {
        let token = token.into();
        let key = (dispatcher, event_type.to_owned());
        let mut state = self.state.borrow_mut();

        let Some(descriptors) = state.entries.get_mut(&key) else {
            warn!(
                event_type,
                token = token.name(),
                "unsubscribe without matching subscription"
            );
            return false;
        };
        let Some(at) = descriptors.iter().position(|d| d.token == token) else {
            warn!(
                event_type,
                token = token.name(),
                "unsubscribe without matching subscription"
            );
            return false;
        };

        let descriptor = descriptors.remove(at);
        if descriptors.is_empty() {
            state.entries.remove(&key);
        }
        if let Some(live) = state
            .links
            .get(&dispatcher)
            .and_then(|link| link.dispatcher.upgrade())
        {
            live.remove_listener(descriptor.handle);
        }

        if !state.has_entries_for(dispatcher) {
            if let Some(link) = state.links.remove(&dispatcher) {
                if let Some(live) = link.dispatcher.upgrade() {
                    live.remove_listener(link.teardown_handle);
                }
            }
        }
        true
    }

    /// Returns `true` if this capability holds any subscription for
    /// `event_type` on the given dispatcher identity.
    ///
    /// Keys on [`DispatcherId`] so it stays answerable after the dispatcher
    /// is destroyed (at which point it reports `false`).
    #[must_use]
    pub fn has_subscription(&self, dispatcher: DispatcherId, event_type: &str) -> bool {
        self.state
            .borrow()
            .entries
            .contains_key(&(dispatcher, event_type.to_owned()))
    }

    /// Returns the total number of tracked subscriptions, excluding the
    /// internal teardown handlers.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.state.borrow().entries.values().map(Vec::len).sum()
    }

    /// Returns the number of deferred calls waiting for a flush.
    #[must_use]
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Drains deferred calls queued by this capability's subscriptions.
    ///
    /// Pops at most the queue depth observed on entry, so a thunk that fires
    /// more events cannot extend the current drain indefinitely; anything
    /// beyond the snapshot depth waits for the next flush. Returns the
    /// number of calls invoked.
    pub fn flush(&self) -> usize {
        let depth = self.deferred.len();
        let mut invoked = 0;
        for _ in 0..depth {
            let Some(call) = self.deferred.pop() else {
                break;
            };
            call.invoke();
            invoked += 1;
        }
        invoked
    }

    /// Attaches the sentinel teardown handler on first contact with a
    /// dispatcher.
    fn ensure_teardown_link(&self, dispatcher: &Dispatcher) {
        let id = dispatcher.id();
        if self.state.borrow().links.contains_key(&id) {
            return;
        }

        let weak_state = Rc::downgrade(&self.state);
        let teardown_handle = dispatcher.add_listener(
            FORCE_UNSUBSCRIBE,
            move |_event| {
                if let Some(state) = weak_state.upgrade() {
                    let dropped = state.borrow_mut().purge(id);
                    info!(
                        dispatcher = id.raw(),
                        dropped, "dispatcher teardown purged subscriptions"
                    );
                }
                true
            },
            0,
        );

        self.state.borrow_mut().links.insert(
            id,
            DispatcherLink {
                dispatcher: dispatcher.downgrade(),
                teardown_handle,
            },
        );
    }
}

impl Drop for EventSubscriptions {
    /// Disconnects every outstanding registration from its dispatcher.
    ///
    /// Dispatchers that are already gone are skipped; their bookkeeping was
    /// purged by the sentinel, and any race remainder fails the weak upgrade.
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        let entries = std::mem::take(&mut state.entries);
        for ((dispatcher, _), descriptors) in entries {
            let Some(live) = state
                .links
                .get(&dispatcher)
                .and_then(|link| link.dispatcher.upgrade())
            else {
                continue;
            };
            for descriptor in descriptors {
                live.remove_listener(descriptor.handle);
            }
        }
        for (_, link) in state.links.drain() {
            if let Some(live) = link.dispatcher.upgrade() {
                live.remove_listener(link.teardown_handle);
            }
        }
    }
}

impl fmt::Debug for EventSubscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscriptions")
            .field("subscriptions", &self.subscription_count())
            .field("pending_deferred", &self.pending_deferred())
            .finish()
    }
}

/// Capability trait for components that own an [`EventSubscriptions`] field.
pub trait Subscriber {
    /// The component's subscription bookkeeping.
    fn subscriptions(&self) -> &EventSubscriptions;

    /// Drains deferred work queued by this component's subscriptions.
    /// Components with deferred subscriptions must call this on their own
    /// schedule; nothing drains the queue automatically.
    fn flush_deferred(&self) -> usize {
        self.subscriptions().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Clone, Copy)]
    struct Ping;

    impl Event for Ping {
        fn event_type(&self) -> &str {
            "ping"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn clone_event(&self) -> Box<dyn Event> {
            Box::new(*self)
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct Pong;

    impl Event for Pong {
        fn event_type(&self) -> &str {
            "pong"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn clone_event(&self) -> Box<dyn Event> {
            Box::new(*self)
        }
    }

    fn counting_handler(count: &Rc<Cell<u32>>) -> impl Fn(&dyn Event) -> bool + 'static {
        let count = Rc::clone(count);
        move |_event| {
            count.set(count.get() + 1);
            true
        }
    }

    #[test]
    fn test_subscribe_and_fire() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        assert!(subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count)));
        dispatcher.fire(&Ping);
        assert_eq!(count.get(), 1);
        assert!(subscriptions.has_subscription(dispatcher.id(), "ping"));
    }

    #[test]
    fn test_duplicate_subscribe_rejected() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        assert!(subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count)));
        assert!(!subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count)));

        dispatcher.fire(&Ping);
        assert_eq!(count.get(), 1);
        assert_eq!(subscriptions.subscription_count(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count));
        dispatcher.fire(&Ping);
        assert!(subscriptions.unsubscribe(dispatcher.id(), "ping", "on_ping"));
        dispatcher.fire(&Ping);

        assert_eq!(count.get(), 1);
        assert!(!subscriptions.has_subscription(dispatcher.id(), "ping"));
    }

    #[test]
    fn test_unsubscribe_without_subscription_reports_failure() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        assert!(!subscriptions.unsubscribe(dispatcher.id(), "ping", "on_ping"));
    }

    #[test]
    fn test_sentinel_registered_on_first_subscribe_only() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        assert!(!dispatcher.has_listeners(FORCE_UNSUBSCRIBE));
        subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count));
        assert_eq!(dispatcher.listener_count(FORCE_UNSUBSCRIBE), 1);
        subscriptions.subscribe(&dispatcher, "pong", "on_pong", counting_handler(&count));
        assert_eq!(dispatcher.listener_count(FORCE_UNSUBSCRIBE), 1);
    }

    #[test]
    fn test_sentinel_removed_with_last_subscription() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count));
        subscriptions.subscribe(&dispatcher, "pong", "on_pong", counting_handler(&count));

        subscriptions.unsubscribe(dispatcher.id(), "ping", "on_ping");
        assert_eq!(dispatcher.listener_count(FORCE_UNSUBSCRIBE), 1);
        subscriptions.unsubscribe(dispatcher.id(), "pong", "on_pong");
        assert_eq!(dispatcher.listener_count(FORCE_UNSUBSCRIBE), 0);
    }

    #[test]
    fn test_dispatcher_teardown_purges_bookkeeping() {
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        let id;
        {
            let dispatcher = Dispatcher::new();
            id = dispatcher.id();
            subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count));
            assert!(subscriptions.has_subscription(id, "ping"));
        }

        assert!(!subscriptions.has_subscription(id, "ping"));
        assert_eq!(subscriptions.subscription_count(), 0);
    }

    #[test]
    fn test_cross_dispatcher_isolation() {
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        let survivor = Dispatcher::new();
        subscriptions.subscribe(&survivor, "ping", "on_ping", counting_handler(&count));
        {
            let doomed = Dispatcher::new();
            subscriptions.subscribe(&doomed, "ping", "on_ping", counting_handler(&count));
        }

        assert!(subscriptions.has_subscription(survivor.id(), "ping"));
        survivor.fire(&Ping);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_subscriber_drop_disconnects_everything() {
        let dispatcher = Dispatcher::new();
        let count = Rc::new(Cell::new(0));
        {
            let subscriptions = EventSubscriptions::new();
            subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count));
            assert!(dispatcher.has_listeners("ping"));
        }
        assert!(!dispatcher.has_listeners("ping"));
        assert!(!dispatcher.has_listeners(FORCE_UNSUBSCRIBE));
        dispatcher.fire(&Ping);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_deferred_delivery_waits_for_flush() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        subscriptions.subscribe_with(
            &dispatcher,
            "ping",
            "on_ping",
            counting_handler(&count),
            0,
            Delivery::Deferred,
        );

        dispatcher.fire(&Ping);
        assert_eq!(count.get(), 0);
        assert_eq!(subscriptions.pending_deferred(), 1);

        assert_eq!(subscriptions.flush(), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(subscriptions.flush(), 0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_deferred_never_interrupts_propagation() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let later = Rc::new(Cell::new(false));

        // Deferred handler would stop the chain if it ran inline.
        subscriptions.subscribe_with(
            &dispatcher,
            "ping",
            "on_ping_deferred",
            |_event| false,
            0,
            Delivery::Deferred,
        );
        let flag = Rc::clone(&later);
        subscriptions.subscribe_with(
            &dispatcher,
            "ping",
            "on_ping_late",
            move |_event| {
                flag.set(true);
                true
            },
            1,
            Delivery::Immediate,
        );

        assert!(dispatcher.fire(&Ping));
        assert!(later.get());
        assert_eq!(subscriptions.flush(), 1);
    }

    #[test]
    fn test_flush_drains_snapshot_depth_only() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let pongs = Rc::new(Cell::new(0));

        let weak = dispatcher.downgrade();
        subscriptions.subscribe_with(
            &dispatcher,
            "ping",
            "on_ping",
            move |_event| {
                // Firing during a flush queues more deferred work.
                if let Some(live) = weak.upgrade() {
                    live.fire(&Pong);
                }
                true
            },
            0,
            Delivery::Deferred,
        );
        subscriptions.subscribe_with(
            &dispatcher,
            "pong",
            "on_pong",
            counting_handler(&pongs),
            0,
            Delivery::Deferred,
        );

        dispatcher.fire(&Ping);
        assert_eq!(subscriptions.pending_deferred(), 1);

        // The pong thunk queued mid-flush waits for the next flush.
        assert_eq!(subscriptions.flush(), 1);
        assert_eq!(pongs.get(), 0);
        assert_eq!(subscriptions.pending_deferred(), 1);

        assert_eq!(subscriptions.flush(), 1);
        assert_eq!(pongs.get(), 1);
        assert_eq!(subscriptions.pending_deferred(), 0);
    }

    #[test]
    fn test_same_token_on_two_dispatchers_is_independent() {
        let first = Dispatcher::new();
        let second = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        assert!(subscriptions.subscribe(&first, "ping", "on_ping", counting_handler(&count)));
        assert!(subscriptions.subscribe(&second, "ping", "on_ping", counting_handler(&count)));

        first.fire(&Ping);
        second.fire(&Ping);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_resubscribe_after_unsubscribe_is_fresh() {
        let dispatcher = Dispatcher::new();
        let subscriptions = EventSubscriptions::new();
        let count = Rc::new(Cell::new(0));

        subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count));
        subscriptions.unsubscribe(dispatcher.id(), "ping", "on_ping");
        assert!(subscriptions.subscribe(&dispatcher, "ping", "on_ping", counting_handler(&count)));

        dispatcher.fire(&Ping);
        assert_eq!(count.get(), 1);
    }
}
