//! Typed publish/subscribe dispatcher.
//!
//! Routes fired events to registered callbacks in ascending priority order
//! with cooperative short-circuit propagation: the first callback returning
//! `false` stops the chain for that fire. Registration and firing are
//! single-threaded by contract; handles are cheap to clone and `!Send`, so
//! the compiler enforces that contract rather than a comment.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::debug;

use ember_common::{DispatcherId, ListenerId};

use crate::event::{DispatcherTeardown, Event, FORCE_UNSUBSCRIBE};

/// Listener callback invoked for each fired event of the registered type.
///
/// Returning `false` stops propagation to later listeners in the same fire.
pub type ListenerFn = Rc<dyn Fn(&dyn Event) -> bool>;

/// A priority-tagged listener registration.
struct Binding {
    /// Ascending order, lower fires first
    priority: i32,
    /// Connection handle
    id: ListenerId,
    /// Registered callback or trampoline
    callback: ListenerFn,
}

/// Listener bookkeeping behind a dispatcher handle.
struct DispatcherState {
    /// Stable identity, remains a valid key after destruction
    id: DispatcherId,
    /// Event type -> bindings sorted by (priority, insertion order)
    listeners: AHashMap<String, Vec<Binding>>,
    /// Connection handle -> owning event type, for removal without a scan
    index: AHashMap<ListenerId, String>,
}

impl Drop for DispatcherState {
    fn drop(&mut self) {
        let Some(bindings) = self.listeners.remove(FORCE_UNSUBSCRIBE) else {
            return;
        };
        debug!(
            dispatcher = self.id.raw(),
            listeners = bindings.len(),
            "dispatcher teardown"
        );
        let event = DispatcherTeardown::new(self.id);
        for binding in &bindings {
            if !(*binding.callback)(&event) {
                break;
            }
        }
    }
}

/// Handle to a dispatcher.
///
/// Clones share the same listener table. Subscribers must not hold strong
/// handles across the producer's lifetime; they store a [`WeakDispatcher`]
/// and rely on the [`FORCE_UNSUBSCRIBE`] sentinel, fired when the last strong
/// handle goes away, to purge their bookkeeping.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Rc<RefCell<DispatcherState>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DispatcherState {
                id: DispatcherId::new(),
                listeners: AHashMap::new(),
                index: AHashMap::new(),
            })),
        }
    }

    /// Returns the stable identity of this dispatcher.
    #[must_use]
    pub fn id(&self) -> DispatcherId {
        self.inner.borrow().id
    }

    /// Creates a non-owning handle to this dispatcher.
    #[must_use]
    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher(Rc::downgrade(&self.inner))
    }

    /// Registers `callback` for `event_type` at `priority`.
    ///
    /// Lower priority values fire first; ties fire in registration order.
    /// The event type is not validated in any way, so callers may register
    /// for types nobody ever fires.
    pub fn add_listener<F>(
        &self,
        event_type: impl Into<String>,
        callback: F,
        priority: i32,
    ) -> ListenerId
    where
        F: Fn(&dyn Event) -> bool + 'static,
    {
        let event_type = event_type.into();
        let id = ListenerId::new();
        let mut state = self.inner.borrow_mut();
        state.index.insert(id, event_type.clone());
        let bindings = state.listeners.entry(event_type).or_default();
        let at = bindings
            .iter()
            .position(|binding| binding.priority > priority)
            .unwrap_or(bindings.len());
        bindings.insert(
            at,
            Binding {
                priority,
                id,
                callback: Rc::new(callback),
            },
        );
        id
    }

    /// Disconnects a listener. No-op if the handle was already removed.
    pub fn remove_listener(&self, handle: ListenerId) {
        let mut state = self.inner.borrow_mut();
        let Some(event_type) = state.index.remove(&handle) else {
            return;
        };
        if let Some(bindings) = state.listeners.get_mut(&event_type) {
            bindings.retain(|binding| binding.id != handle);
            if !bindings.is_empty() {
                return;
            }
        }
        state.listeners.remove(&event_type);
    }

    /// Fires an event through every listener registered for its type.
    ///
    /// Listeners run inline on the calling thread, in priority order, until
    /// one returns `false`. Firing a type nobody listens to is a silent
    /// no-op. Returns `false` if a listener stopped propagation; most call
    /// sites ignore the result.
    pub fn fire(&self, event: &dyn Event) -> bool {
        // Snapshot the chain first so listeners may subscribe or unsubscribe
        // re-entrantly without invalidating the iteration.
        let callbacks: Vec<ListenerFn> = {
            let state = self.inner.borrow();
            match state.listeners.get(event.event_type()) {
                Some(bindings) => bindings
                    .iter()
                    .map(|binding| Rc::clone(&binding.callback))
                    .collect(),
                None => return true,
            }
        };
        for callback in callbacks {
            if !(*callback)(event) {
                return false;
            }
        }
        true
    }

    /// Returns `true` if any listener is registered for `event_type`.
    #[must_use]
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.inner.borrow().listeners.contains_key(event_type)
    }

    /// Returns the number of listeners registered for `event_type`.
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Dispatcher")
            .field("id", &state.id)
            .field("event_types", &state.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to a dispatcher.
#[derive(Clone)]
pub struct WeakDispatcher(Weak<RefCell<DispatcherState>>);

impl WeakDispatcher {
    /// Attempts to recover a strong handle.
    ///
    /// Fails once the dispatcher is gone, including while its teardown
    /// sentinel is still being delivered.
    #[must_use]
    pub fn upgrade(&self) -> Option<Dispatcher> {
        self.0.upgrade().map(|inner| Dispatcher { inner })
    }
}

impl fmt::Debug for WeakDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDispatcher")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}
