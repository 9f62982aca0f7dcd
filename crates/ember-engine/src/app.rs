//! Application lifecycle management.
//!
//! The engine owns the central event bus and drives the fixed tick loop:
//! drain file changes, fire the heartbeat, flush deferred work.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use ember_common::EmberResult;
use ember_events::{Dispatcher, EventSubscriptions, Subscriber};

use crate::config::EngineConfig;
use crate::events::{FileChangedEvent, ShutdownRequested, TickEvent};
use crate::fs_watch::FileWatcher;
use crate::input::InputManager;
use crate::overlay::DebugOverlay;

/// Engine core: central bus, subsystems, tick loop.
pub struct Engine {
    /// Engine configuration
    config: EngineConfig,
    /// Central event bus
    bus: Dispatcher,
    /// Input subsystem with its own dispatcher
    input: InputManager,
    /// Debug overlay consumer
    overlay: DebugOverlay,
    /// Filesystem watcher, when enabled
    watcher: Option<FileWatcher>,
    /// The engine's own subscriptions (shutdown handling)
    subscriptions: EventSubscriptions,
    /// Cleared by the shutdown handler
    running: Rc<Cell<bool>>,
    /// Ticks completed so far
    ticks: u64,
}

impl Engine {
    /// Builds the engine from a validated configuration.
    pub fn new(config: EngineConfig) -> EmberResult<Self> {
        let bus = Dispatcher::new();
        let input = InputManager::new();
        let overlay = DebugOverlay::new(&bus, input.dispatcher(), config.deferred_queue_capacity);

        let watcher = if config.watch_enabled {
            let mut watcher = FileWatcher::new(config.watch_queue_capacity)?;
            for path in &config.watch_paths {
                if let Err(e) = watcher.watch(path) {
                    warn!(path = %path.display(), "Failed to watch path: {e}");
                }
            }
            Some(watcher)
        } else {
            None
        };

        let subscriptions = EventSubscriptions::new();
        let running = Rc::new(Cell::new(true));
        let flag = Rc::clone(&running);
        subscriptions.subscribe(
            &bus,
            crate::events::topics::SHUTDOWN,
            "engine.on_shutdown",
            move |event| {
                if let Some(request) = event.as_any().downcast_ref::<ShutdownRequested>() {
                    info!(reason = %request.reason, "Shutdown requested");
                }
                flag.set(false);
                true
            },
        );

        Ok(Self {
            config,
            bus,
            input,
            overlay,
            watcher,
            subscriptions,
            running,
            ticks: 0,
        })
    }

    /// The central event bus.
    #[must_use]
    pub fn bus(&self) -> &Dispatcher {
        &self.bus
    }

    /// The input subsystem.
    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    /// The debug overlay.
    #[must_use]
    pub fn overlay(&self) -> &DebugOverlay {
        &self.overlay
    }

    /// Ticks completed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// `false` once a shutdown request has been observed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Fires `engine.shutdown` on the bus; the loop stops at the end of the
    /// current tick.
    pub fn request_shutdown(&self, reason: &str) {
        self.bus.fire(&ShutdownRequested::new(reason));
    }

    /// Runs a single engine tick: file changes, heartbeat, deferred flush.
    pub fn update(&mut self, delta_seconds: f32) {
        self.ticks += 1;

        if let Some(watcher) = &self.watcher {
            for change in watcher.poll() {
                self.bus.fire(&FileChangedEvent {
                    path: change.path,
                    kind: change.kind,
                });
            }
        }

        self.bus.fire(&TickEvent {
            tick: self.ticks,
            delta_seconds,
        });

        self.overlay.flush_deferred();
        self.subscriptions.flush();
    }

    /// Runs the fixed tick loop until shutdown or until the configured
    /// maximum tick count is reached.
    pub fn run(&mut self) {
        let budget = Duration::from_secs_f64(1.0 / f64::from(self.config.tick_rate.max(1)));
        let mut last = Instant::now();

        info!(tick_rate = self.config.tick_rate, "Engine loop starting");
        while self.running.get() {
            if let Some(max) = self.config.max_ticks {
                if self.ticks >= max {
                    info!(ticks = self.ticks, "Tick budget reached");
                    break;
                }
            }

            let now = Instant::now();
            let delta = now.duration_since(last).as_secs_f32();
            last = now;

            self.update(delta);

            let elapsed = last.elapsed();
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            }
        }
        info!(ticks = self.ticks, "Engine loop finished");
    }
}

impl Subscriber for Engine {
    fn subscriptions(&self) -> &EventSubscriptions {
        &self.subscriptions
    }
}

/// Loads configuration, builds the engine, and runs the tick loop.
pub fn run() -> Result<()> {
    let mut config = EngineConfig::load();
    config.validate();

    let mut engine = Engine::new(config)?;
    engine.run();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig {
            watch_enabled: false,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_update_fires_tick_on_bus() {
        let mut engine = Engine::new(test_config()).expect("Failed to build engine");
        engine.update(0.016);
        engine.update(0.016);
        assert_eq!(engine.ticks(), 2);
        assert_eq!(engine.overlay().stats().ticks, 2);
    }

    #[test]
    fn test_shutdown_event_stops_loop() {
        let mut engine = Engine::new(test_config()).expect("Failed to build engine");
        assert!(engine.is_running());
        engine.request_shutdown("test over");
        assert!(!engine.is_running());
        // A further update still works; the loop just would not continue.
        engine.update(0.016);
        assert_eq!(engine.ticks(), 1);
    }

    #[test]
    fn test_run_honors_max_ticks() {
        let config = EngineConfig {
            tick_rate: 240,
            max_ticks: Some(3),
            ..test_config()
        };
        let mut engine = Engine::new(config).expect("Failed to build engine");
        engine.run();
        assert_eq!(engine.ticks(), 3);
    }
}
