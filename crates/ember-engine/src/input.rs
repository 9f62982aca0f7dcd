//! Input manager.
//!
//! Tracks held keys and publishes press/release edges on its own dispatcher.
//! Repeated presses of a held key do not re-fire; consumers interested in
//! held state query it directly.

use std::collections::HashSet;

use ember_events::Dispatcher;

use crate::events::{KeyPressed, KeyReleased};

/// Logical keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Move forward
    W,
    /// Strafe left
    A,
    /// Move backward
    S,
    /// Strafe right
    D,
    /// Arrow up
    Up,
    /// Arrow down
    Down,
    /// Arrow left
    Left,
    /// Arrow right
    Right,
    /// Space bar
    Space,
    /// Enter/return
    Enter,
    /// Escape
    Escape,
    /// Tab
    Tab,
    /// Left shift
    LShift,
    /// Left control
    LCtrl,
    /// Debug overlay toggle
    F3,
}

/// Tracks held keys and fires edge events.
#[derive(Debug)]
pub struct InputManager {
    /// Dispatcher for input events
    dispatcher: Dispatcher,
    /// Currently held keys
    held: HashSet<Key>,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    /// Creates an input manager with an empty held set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            held: HashSet::new(),
        }
    }

    /// The dispatcher input events are fired on.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Records a key going down. Fires `input.key_pressed` on the press
    /// edge; returns `false` if the key was already held.
    pub fn press(&mut self, key: Key) -> bool {
        if !self.held.insert(key) {
            return false;
        }
        self.dispatcher.fire(&KeyPressed { key });
        true
    }

    /// Records a key going up. Fires `input.key_released` on the release
    /// edge; returns `false` if the key was not held.
    pub fn release(&mut self, key: Key) -> bool {
        if !self.held.remove(&key) {
            return false;
        }
        self.dispatcher.fire(&KeyReleased { key });
        true
    }

    /// Returns `true` while the key is held.
    #[must_use]
    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Releases every held key, firing release edges. Used when the engine
    /// loses focus and can no longer observe the real key state.
    pub fn release_all(&mut self) {
        let held: Vec<Key> = self.held.drain().collect();
        for key in held {
            self.dispatcher.fire(&KeyReleased { key });
        }
    }
}
