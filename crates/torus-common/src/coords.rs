//! Coordinate types for tile, chunk, and cell positions.
//!
//! These are the raw, unwrapped coordinate spaces. Wrapping onto the
//! toroidal world needs the world dimensions and lives in
//! `torus_world::geometry`.

use serde::{Deserialize, Serialize};

/// Tile coordinate (one grid cell of the world, unbounded).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    /// X coordinate in tile space
    pub x: i32,
    /// Y coordinate in tile space
    pub y: i32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to the owning chunk coordinate given chunk size in tiles.
    #[must_use]
    pub const fn to_chunk_coord(self, chunk_size: u32) -> ChunkCoord {
        let size = chunk_size as i32;
        ChunkCoord {
            x: self.x.div_euclid(size),
            y: self.y.div_euclid(size),
        }
    }

    /// Converts to the cell coordinate within the owning chunk.
    #[must_use]
    pub const fn to_cell_coord(self, chunk_size: u32) -> CellCoord {
        let size = chunk_size as i32;
        CellCoord {
            x: self.x.rem_euclid(size) as u16,
            y: self.y.rem_euclid(size) as u16,
        }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tile({}, {})", self.x, self.y)
    }
}

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ChunkCoord {
    /// X coordinate in chunk space
    pub x: i32,
    /// Y coordinate in chunk space
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts to tile coordinate (top-left tile of chunk).
    #[must_use]
    pub const fn to_tile_origin(self, chunk_size: u32) -> TileCoord {
        let size = chunk_size as i32;
        TileCoord {
            x: self.x * size,
            y: self.y * size,
        }
    }

    /// Tile coordinate of the given cell inside this chunk.
    #[must_use]
    pub const fn cell_to_tile(self, cell: CellCoord, chunk_size: u32) -> TileCoord {
        let origin = self.to_tile_origin(chunk_size);
        TileCoord {
            x: origin.x + cell.x as i32,
            y: origin.y + cell.y as i32,
        }
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cell coordinate: a tile offset within its chunk (0 to chunk_size-1).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CellCoord {
    /// X offset within chunk
    pub x: u16,
    /// Y offset within chunk
    pub y: u16,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Checks that both offsets fall inside a chunk of the given size.
    #[must_use]
    pub const fn is_within(self, chunk_size: u32) -> bool {
        (self.x as u32) < chunk_size && (self.y as u32) < chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_to_chunk_negative() {
        let tile = TileCoord::new(-1, -17);
        assert_eq!(tile.to_chunk_coord(16), ChunkCoord::new(-1, -2));
        assert_eq!(tile.to_cell_coord(16), CellCoord::new(15, 15));
    }

    #[test]
    fn test_chunk_cell_to_tile() {
        let chunk = ChunkCoord::new(2, 3);
        let tile = chunk.cell_to_tile(CellCoord::new(5, 7), 16);
        assert_eq!(tile, TileCoord::new(37, 55));
        assert_eq!(tile.to_chunk_coord(16), chunk);
        assert_eq!(tile.to_cell_coord(16), CellCoord::new(5, 7));
    }

    #[test]
    fn test_cell_within() {
        assert!(CellCoord::new(15, 0).is_within(16));
        assert!(!CellCoord::new(16, 0).is_within(16));
        assert!(!CellCoord::new(0, 16).is_within(16));
    }
}
