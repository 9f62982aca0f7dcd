//! Debug overlay consumer.
//!
//! Counts engine activity for on-screen display. Subscribes across two
//! dispatchers: ticks and file changes on the engine bus, key presses on the
//! input dispatcher. File changes arrive deferred and are folded in when the
//! tick loop flushes, so a burst of disk activity never stalls dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use ember_events::{Delivery, Dispatcher, EventSubscriptions, Subscriber};

use crate::events::{topics, FileChangedEvent, KeyPressed};

/// Counters the overlay displays.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverlayStats {
    /// Ticks observed
    pub ticks: u64,
    /// Key press edges observed
    pub key_presses: u64,
    /// File changes folded in via deferred delivery
    pub file_changes: u64,
}

/// Debug overlay composing the subscriber capability across the engine bus
/// and the input dispatcher.
#[derive(Debug)]
pub struct DebugOverlay {
    subscriptions: EventSubscriptions,
    stats: Rc<RefCell<OverlayStats>>,
}

impl DebugOverlay {
    /// Subscribes the overlay on both dispatchers.
    #[must_use]
    pub fn new(bus: &Dispatcher, input: &Dispatcher, queue_capacity: usize) -> Self {
        let subscriptions = EventSubscriptions::with_queue_capacity(queue_capacity);
        let stats = Rc::new(RefCell::new(OverlayStats::default()));

        // Late priority: the overlay observes ticks after gameplay handlers.
        let sink = Rc::clone(&stats);
        subscriptions.subscribe_with(
            bus,
            topics::TICK,
            "overlay.on_tick",
            move |_event| {
                sink.borrow_mut().ticks += 1;
                true
            },
            10,
            Delivery::Immediate,
        );

        let sink = Rc::clone(&stats);
        subscriptions.subscribe(input, topics::KEY_PRESSED, "overlay.on_key", move |event| {
            if event.as_any().downcast_ref::<KeyPressed>().is_some() {
                sink.borrow_mut().key_presses += 1;
            }
            true
        });

        let sink = Rc::clone(&stats);
        subscriptions.subscribe_with(
            bus,
            topics::FILE_CHANGED,
            "overlay.on_file_changed",
            move |event| {
                if event.as_any().downcast_ref::<FileChangedEvent>().is_some() {
                    sink.borrow_mut().file_changes += 1;
                }
                true
            },
            0,
            Delivery::Deferred,
        );

        Self {
            subscriptions,
            stats,
        }
    }

    /// Snapshot of the current counters.
    #[must_use]
    pub fn stats(&self) -> OverlayStats {
        *self.stats.borrow()
    }
}

impl Subscriber for DebugOverlay {
    fn subscriptions(&self) -> &EventSubscriptions {
        &self.subscriptions
    }
}
