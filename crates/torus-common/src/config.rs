//! World configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default world width in tiles.
pub const DEFAULT_GRID_WIDTH: u32 = 100;

/// Default world height in tiles.
pub const DEFAULT_GRID_HEIGHT: u32 = 100;

/// Default tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 40;

/// Default chunk size in tiles.
pub const DEFAULT_CHUNK_SIZE: u32 = 16;

/// Default world seed.
pub const DEFAULT_SEED: u64 = 42;

/// Parameters that fully determine a world's procedural content.
///
/// Changing any of these after chunks have been cached is a breaking
/// change; the owner must drop every cached chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World width in tiles
    pub grid_width_tiles: u32,
    /// World height in tiles
    pub grid_height_tiles: u32,
    /// Tile edge length in pixels
    pub tile_size_pixels: u32,
    /// Chunk edge length in tiles
    pub chunk_size_tiles: u32,
    /// World seed
    pub seed: u64,
    /// Fraction of chunk columns (from the west edge) that are plains
    pub biome_plains_fraction: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_width_tiles: DEFAULT_GRID_WIDTH,
            grid_height_tiles: DEFAULT_GRID_HEIGHT,
            tile_size_pixels: DEFAULT_TILE_SIZE,
            chunk_size_tiles: DEFAULT_CHUNK_SIZE,
            seed: DEFAULT_SEED,
            biome_plains_fraction: 0.5,
        }
    }
}

impl WorldConfig {
    /// Creates the default config with the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Rejects configurations that would divide by zero or produce no chunks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size_pixels == 0 {
            return Err(ConfigError::InvalidTileSize);
        }
        if self.chunk_size_tiles == 0 || self.chunk_size_tiles > u32::from(u16::MAX) {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.grid_width_tiles == 0
            || self.grid_height_tiles == 0
            || self.grid_width_tiles > i32::MAX as u32
            || self.grid_height_tiles > i32::MAX as u32
        {
            return Err(ConfigError::InvalidGridDimensions {
                width: self.grid_width_tiles,
                height: self.grid_height_tiles,
            });
        }
        if !(0.0..=1.0).contains(&self.biome_plains_fraction) {
            return Err(ConfigError::InvalidBiomeFraction(
                self.biome_plains_fraction,
            ));
        }
        Ok(())
    }

    /// Name of the first parameter that differs from `other`, if any.
    #[must_use]
    pub fn differing_field(&self, other: &Self) -> Option<&'static str> {
        if self.seed != other.seed {
            Some("seed")
        } else if self.chunk_size_tiles != other.chunk_size_tiles {
            Some("chunk size")
        } else if self.tile_size_pixels != other.tile_size_pixels {
            Some("tile size")
        } else if self.grid_width_tiles != other.grid_width_tiles
            || self.grid_height_tiles != other.grid_height_tiles
        {
            Some("grid size")
        } else if self.biome_plains_fraction.to_bits() != other.biome_plains_fraction.to_bits() {
            Some("biome fraction")
        } else {
            None
        }
    }

    /// Number of chunks along the X axis (last column may be partial).
    #[must_use]
    pub const fn chunks_x(&self) -> u32 {
        self.grid_width_tiles.div_ceil(self.chunk_size_tiles)
    }

    /// Number of chunks along the Y axis (last row may be partial).
    #[must_use]
    pub const fn chunks_y(&self) -> u32 {
        self.grid_height_tiles.div_ceil(self.chunk_size_tiles)
    }
}
