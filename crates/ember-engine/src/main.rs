//! # Ember Engine
//!
//! Main entry point for Project Ember - a headless engine core built around
//! an in-process event dispatch system.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ember_engine::app;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ember=info".parse()?))
        .init();

    info!("Project Ember starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Run the application
    app::run()?;

    info!("Project Ember shutdown complete");
    Ok(())
}
