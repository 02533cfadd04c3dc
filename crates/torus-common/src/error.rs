//! Error types for Project Torus.

use thiserror::Error;

use crate::ids::WorldId;

/// World configuration errors. These are fatal at world construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Tile size must be positive
    #[error("Tile size must be greater than zero")]
    InvalidTileSize,

    /// Chunk size must be positive
    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    /// Grid dimensions must be positive
    #[error("Grid dimensions must be positive, got {width}x{height}")]
    InvalidGridDimensions {
        /// Grid width in tiles
        width: u32,
        /// Grid height in tiles
        height: u32,
    },

    /// Biome fraction outside [0, 1]
    #[error("Biome plains fraction must be within [0, 1], got {0}")]
    InvalidBiomeFraction(f64),
}

/// Overlay store errors.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Invalid magic bytes or header
    #[error("Invalid overlay format")]
    InvalidFormat,

    /// Schema version mismatch
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },

    /// Store could not be reached
    #[error("Overlay store unavailable: {0}")]
    Unavailable(String),
}

/// World engine errors.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Overlay write or query failed
    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),

    /// The world exists with a different layout or seed
    #[error("World {world} was created with a different {field}; its overlay records would land on other tiles")]
    ConfigMismatch {
        /// World whose stored record disagrees
        world: WorldId,
        /// First parameter that differs
        field: &'static str,
    },

    /// No record exists for the world
    #[error("World {0} not found")]
    UnknownWorld(WorldId),

    /// Cell offset outside the chunk
    #[error("Cell ({cell_x}, {cell_y}) is outside chunk of size {chunk_size}")]
    CellOutOfRange {
        /// Cell X offset
        cell_x: i64,
        /// Cell Y offset
        cell_y: i64,
        /// Chunk size in tiles
        chunk_size: u32,
    },

    /// Overlay read failed while materializing a chunk
    #[error("Failed to materialize chunk ({x}, {y}): {source}")]
    MaterializationFailed {
        /// Chunk X coordinate
        x: i32,
        /// Chunk Y coordinate
        y: i32,
        /// Underlying overlay failure
        #[source]
        source: OverlayError,
    },
}

/// Result type alias for overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Result type alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
