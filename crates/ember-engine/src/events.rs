//! Engine event types routed through the dispatch core.

use std::any::Any;
use std::path::PathBuf;

use serde_json::Value;

use ember_events::Event;

use crate::fs_watch::FileChangeKind;
use crate::input::Key;

/// Event type names fired by engine subsystems.
pub mod topics {
    /// Fired once per engine tick
    pub const TICK: &str = "engine.tick";
    /// Fired when the main surface is resized
    pub const WINDOW_RESIZED: &str = "engine.window_resized";
    /// Fired for each watched file that changed on disk
    pub const FILE_CHANGED: &str = "engine.file_changed";
    /// Fired to request an orderly engine stop
    pub const SHUTDOWN: &str = "engine.shutdown";
    /// Fired on a key press edge
    pub const KEY_PRESSED: &str = "input.key_pressed";
    /// Fired on a key release edge
    pub const KEY_RELEASED: &str = "input.key_released";
    /// Fired by plugins and scripts with an arbitrary payload
    pub const PLUGIN: &str = "plugin.custom";
}

/// Per-tick heartbeat.
#[derive(Debug, Clone, Copy)]
pub struct TickEvent {
    /// Tick counter, starting at 1
    pub tick: u64,
    /// Seconds elapsed since the previous tick
    pub delta_seconds: f32,
}

impl Event for TickEvent {
    fn event_type(&self) -> &str {
        topics::TICK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(*self)
    }
}

/// Main surface resized.
#[derive(Debug, Clone, Copy)]
pub struct WindowResized {
    /// New width in pixels
    pub width: u32,
    /// New height in pixels
    pub height: u32,
}

impl Event for WindowResized {
    fn event_type(&self) -> &str {
        topics::WINDOW_RESIZED
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(*self)
    }
}

/// Key press edge.
#[derive(Debug, Clone, Copy)]
pub struct KeyPressed {
    /// The key that went down
    pub key: Key,
}

impl Event for KeyPressed {
    fn event_type(&self) -> &str {
        topics::KEY_PRESSED
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(*self)
    }
}

/// Key release edge.
#[derive(Debug, Clone, Copy)]
pub struct KeyReleased {
    /// The key that went up
    pub key: Key,
}

impl Event for KeyReleased {
    fn event_type(&self) -> &str {
        topics::KEY_RELEASED
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(*self)
    }
}

/// Watched file changed on disk.
#[derive(Debug, Clone)]
pub struct FileChangedEvent {
    /// Affected path
    pub path: PathBuf,
    /// What happened to it
    pub kind: FileChangeKind,
}

impl Event for FileChangedEvent {
    fn event_type(&self) -> &str {
        topics::FILE_CHANGED
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }
}

/// Request for an orderly engine stop at the end of the current tick.
#[derive(Debug, Clone)]
pub struct ShutdownRequested {
    /// Human-readable reason, recorded in the log
    pub reason: String,
}

impl ShutdownRequested {
    /// Creates a shutdown request with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Event for ShutdownRequested {
    fn event_type(&self) -> &str {
        topics::SHUTDOWN
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }
}

/// Free-form event fired by plugins and scripts.
#[derive(Debug, Clone)]
pub struct PluginEvent {
    /// Plugin-chosen event name
    pub name: String,
    /// JSON payload
    pub payload: Value,
}

impl Event for PluginEvent {
    fn event_type(&self) -> &str {
        topics::PLUGIN
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }
}
