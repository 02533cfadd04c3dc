//! # Torus Common
//!
//! Common types, utilities, and shared abstractions for Project Torus.
//!
//! This crate provides foundational types used across all Torus subsystems:
//! - Coordinate types (tile, chunk, cell)
//! - World configuration
//! - ID types
//! - Version information for on-disk formats
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod coords;
pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
