//! # Torus Engine
//!
//! Headless driver for Project Torus, a toroidal chunked 2D world.
//!
//! This binary ties together:
//! - World: geometry, generation, chunk caching, culling
//! - Overlay: per-cell modifications persisted to disk
//!
//! Usage: `torus [config.toml]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;
mod timing;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EngineConfig;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("torus=info".parse()?))
        .init();

    info!("Project Torus starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };
    config.validate();

    let summary = app::run(&config)?;

    info!("Project Torus finished after {} ticks", summary.ticks);
    Ok(())
}
