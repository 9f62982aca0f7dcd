//! Engine configuration.
//!
//! Configurable parameters for the tick loop, event queues, and file
//! watching. Configuration can be loaded from and saved to a TOML file;
//! anything missing or unreadable falls back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use ember_common::{EmberError, EmberResult};

/// Configuration file name.
const CONFIG_FILE: &str = "ember.toml";

/// Engine configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Loop Settings ===
    /// Fixed update rate in ticks per second
    pub tick_rate: u32,
    /// Maximum ticks to run before exiting (None = run until shutdown)
    pub max_ticks: Option<u64>,

    // === Event Settings ===
    /// Capacity of each subscriber's deferred-delivery queue
    pub deferred_queue_capacity: usize,

    // === File Watch Settings ===
    /// Enable filesystem watching
    pub watch_enabled: bool,
    /// Paths watched for changes
    pub watch_paths: Vec<PathBuf>,
    /// Capacity of the file-change handoff queue
    pub watch_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Loop
            tick_rate: 60,
            max_ticks: None,

            // Events
            deferred_queue_capacity: 256,

            // File watch
            watch_enabled: false,
            watch_paths: vec![PathBuf::from("assets")],
            watch_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            }
        }
    }

    /// Save configuration to the default file location.
    pub fn save(&self) -> EmberResult<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> EmberResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| EmberError::Config(e.to_string()))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    fn config_path() -> PathBuf {
        if let Some(config_dir) = dirs_config_path() {
            config_dir.join("ember").join(CONFIG_FILE)
        } else {
            PathBuf::from(CONFIG_FILE)
        }
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.tick_rate = self.tick_rate.clamp(1, 240);
        self.deferred_queue_capacity = self.deferred_queue_capacity.clamp(16, 65_536);
        self.watch_queue_capacity = self.watch_queue_capacity.clamp(16, 65_536);
    }
}

/// Get platform-specific config directory.
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library/Application Support"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
