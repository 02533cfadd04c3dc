//! Coordinate conversion and toroidal wrapping.
//!
//! The world is a torus: moving past one edge re-enters from the opposite
//! edge. All conversions here are pure; the only failure mode is an invalid
//! [`WorldConfig`], which is rejected when the geometry is built.

use torus_common::{CellCoord, ChunkCoord, ConfigError, TileCoord, WorldConfig};

/// Half-open rectangle of tiles `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    /// Top-left tile (inclusive)
    pub min: TileCoord,
    /// Bottom-right tile (exclusive)
    pub max: TileCoord,
}

impl TileBounds {
    /// Width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        (self.max.x - self.min.x) as u32
    }

    /// Height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        (self.max.y - self.min.y) as u32
    }

    /// Number of tiles covered.
    #[must_use]
    pub const fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Checks whether the tile lies inside the bounds.
    #[must_use]
    pub const fn contains(&self, tile: TileCoord) -> bool {
        tile.x >= self.min.x && tile.x < self.max.x && tile.y >= self.min.y && tile.y < self.max.y
    }

    /// Iterates tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> {
        let (min, max) = (self.min, self.max);
        (min.y..max.y).flat_map(move |y| (min.x..max.x).map(move |x| TileCoord::new(x, y)))
    }
}

/// Pixel, tile, and chunk conversions for one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldGeometry {
    grid_width: u32,
    grid_height: u32,
    tile_size: u32,
    chunk_size: u32,
    chunks_x: u32,
    chunks_y: u32,
}

impl WorldGeometry {
    /// Builds the geometry, refusing configurations that would divide by zero.
    pub fn new(config: &WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            grid_width: config.grid_width_tiles,
            grid_height: config.grid_height_tiles,
            tile_size: config.tile_size_pixels,
            chunk_size: config.chunk_size_tiles,
            chunks_x: config.chunks_x(),
            chunks_y: config.chunks_y(),
        })
    }

    /// World size in tiles (width, height).
    #[must_use]
    pub const fn grid_size(&self) -> (u32, u32) {
        (self.grid_width, self.grid_height)
    }

    /// Tile edge length in pixels.
    #[must_use]
    pub const fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Chunk edge length in tiles.
    #[must_use]
    pub const fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunks along each axis.
    #[must_use]
    pub const fn chunk_count(&self) -> (u32, u32) {
        (self.chunks_x, self.chunks_y)
    }

    /// World size in pixels (width, height).
    #[must_use]
    pub fn world_size_pixels(&self) -> (f64, f64) {
        (
            f64::from(self.grid_width) * f64::from(self.tile_size),
            f64::from(self.grid_height) * f64::from(self.tile_size),
        )
    }

    /// Floor-divides a pixel position into a tile coordinate.
    #[must_use]
    pub fn pixel_to_tile(&self, px: f64, py: f64) -> TileCoord {
        let size = f64::from(self.tile_size);
        TileCoord::new((px / size).floor() as i32, (py / size).floor() as i32)
    }

    /// Pixel position of a tile's centre.
    #[must_use]
    pub fn tile_to_pixel_center(&self, tile: TileCoord) -> (f64, f64) {
        let size = f64::from(self.tile_size);
        (
            f64::from(tile.x) * size + size / 2.0,
            f64::from(tile.y) * size + size / 2.0,
        )
    }

    /// Pixel position of a tile's top-left corner.
    #[must_use]
    pub fn tile_to_pixel_origin(&self, tile: TileCoord) -> (f64, f64) {
        let size = f64::from(self.tile_size);
        (f64::from(tile.x) * size, f64::from(tile.y) * size)
    }

    /// Floor-divides a tile coordinate into a chunk coordinate (no wrapping).
    #[must_use]
    pub const fn tile_to_chunk(&self, tile: TileCoord) -> ChunkCoord {
        tile.to_chunk_coord(self.chunk_size)
    }

    /// Top-left tile of a chunk (no wrapping).
    #[must_use]
    pub const fn chunk_to_tile_origin(&self, chunk: ChunkCoord) -> TileCoord {
        chunk.to_tile_origin(self.chunk_size)
    }

    /// Top-left pixel of a chunk (no wrapping).
    #[must_use]
    pub fn chunk_pixel_origin(&self, chunk: ChunkCoord) -> (f64, f64) {
        self.tile_to_pixel_origin(self.chunk_to_tile_origin(chunk))
    }

    /// Wraps a pixel position into `[0, width) x [0, height)`.
    #[must_use]
    pub fn wrap_pixel(&self, px: f64, py: f64) -> (f64, f64) {
        let (width, height) = self.world_size_pixels();
        (wrap_f64(px, width), wrap_f64(py, height))
    }

    /// Wraps a tile coordinate into the grid.
    #[must_use]
    pub const fn wrap_tile(&self, tile: TileCoord) -> TileCoord {
        TileCoord::new(
            tile.x.rem_euclid(self.grid_width as i32),
            tile.y.rem_euclid(self.grid_height as i32),
        )
    }

    /// Wraps a chunk coordinate into `[0, chunks_x) x [0, chunks_y)`.
    #[must_use]
    pub const fn wrap_chunk(&self, chunk: ChunkCoord) -> ChunkCoord {
        ChunkCoord::new(
            chunk.x.rem_euclid(self.chunks_x as i32),
            chunk.y.rem_euclid(self.chunks_y as i32),
        )
    }

    /// Tiles owned by a chunk, clipped to the grid for the partial last row/column.
    ///
    /// The chunk is wrapped first, so the bounds are always canonical.
    #[must_use]
    pub fn chunk_tile_bounds(&self, chunk: ChunkCoord) -> TileBounds {
        let chunk = self.wrap_chunk(chunk);
        let min = self.chunk_to_tile_origin(chunk);
        let size = self.chunk_size as i32;
        let max = TileCoord::new(
            (min.x + size).min(self.grid_width as i32),
            (min.y + size).min(self.grid_height as i32),
        );
        TileBounds { min, max }
    }

    /// Wraps a tile and splits it into its owning chunk and cell offset.
    #[must_use]
    pub const fn tile_to_cell(&self, tile: TileCoord) -> (ChunkCoord, CellCoord) {
        let tile = self.wrap_tile(tile);
        (
            tile.to_chunk_coord(self.chunk_size),
            tile.to_cell_coord(self.chunk_size),
        )
    }

    /// Tile coordinate addressed by a chunk and cell offset.
    #[must_use]
    pub const fn cell_to_tile(&self, chunk: ChunkCoord, cell: CellCoord) -> TileCoord {
        chunk.cell_to_tile(cell, self.chunk_size)
    }

    /// Wraps a pixel position and resolves the chunk and cell that own it.
    #[must_use]
    pub fn pixel_to_cell(&self, px: f64, py: f64) -> (ChunkCoord, CellCoord) {
        let (px, py) = self.wrap_pixel(px, py);
        self.tile_to_cell(self.pixel_to_tile(px, py))
    }

    /// Chebyshev distance between two chunks measured around the torus.
    #[must_use]
    pub const fn chunk_distance(&self, a: ChunkCoord, b: ChunkCoord) -> u32 {
        let dx = torus_axis_distance(a.x, b.x, self.chunks_x);
        let dy = torus_axis_distance(a.y, b.y, self.chunks_y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }
}

/// Euclidean wrap of a float, guarding the rounding case where the
/// remainder lands exactly on `size`.
fn wrap_f64(value: f64, size: f64) -> f64 {
    let wrapped = value.rem_euclid(size);
    if wrapped >= size {
        wrapped - size
    } else {
        wrapped
    }
}

const fn torus_axis_distance(a: i32, b: i32, count: u32) -> u32 {
    let d = (a - b).rem_euclid(count as i32) as u32;
    let around = count - d;
    if d < around {
        d
    } else {
        around
    }
}
