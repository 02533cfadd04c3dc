//! Materialized chunk data.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use torus_common::{CellCoord, ChunkCoord, TileCoord};
use tracing::warn;

use crate::geometry::TileBounds;
use crate::overlay::{ChunkOverrides, PlacedEntity};

/// Collision radius of a tree in pixels.
pub const TREE_COLLISION_RADIUS: f64 = 18.0;
/// Collision radius of a rock in pixels.
pub const ROCK_COLLISION_RADIUS: f64 = 12.0;

/// Terrain kind of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    /// Grassland
    Plains,
    /// Sand
    Desert,
}

impl TerrainKind {
    /// Returns the terrain name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plains => "plains",
            Self::Desert => "desert",
        }
    }
}

/// Kind of an object placed on a tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Ground cover, drawn beneath everything
    Grass,
    /// Tree
    Tree,
    /// Rock
    Rock,
    /// Spawn marker
    Marker,
    /// Anything placed by gameplay that the engine has no built-in kind for
    Custom(String),
}

impl ObjectKind {
    /// Returns the kind name as stored in overlay records.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Grass => "grass",
            Self::Tree => "tree",
            Self::Rock => "rock",
            Self::Marker => "marker",
            Self::Custom(name) => name,
        }
    }

    /// Parses a kind name. Unknown names become [`ObjectKind::Custom`].
    #[must_use]
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "grass" => Self::Grass,
            "tree" => Self::Tree,
            "rock" => Self::Rock,
            "marker" => Self::Marker,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Collision radius in pixels, if the kind blocks movement.
    #[must_use]
    pub const fn collision_radius(&self) -> Option<f64> {
        match self {
            Self::Tree => Some(TREE_COLLISION_RADIUS),
            Self::Rock => Some(ROCK_COLLISION_RADIUS),
            _ => None,
        }
    }

    /// Upright objects, drawn after everything else and ordered by pixel y
    /// across all visible chunks.
    #[must_use]
    pub const fn is_depth_sorted(&self) -> bool {
        matches!(self, Self::Tree)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Tile X (canonical, inside the grid)
    pub x: i32,
    /// Tile Y (canonical, inside the grid)
    pub y: i32,
    /// Deterministic per-tile hash
    pub hash: u32,
    /// Terrain kind
    pub terrain: TerrainKind,
}

/// An object occupying a tile, positioned at the tile's pixel centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedObject {
    /// Object kind
    pub kind: ObjectKind,
    /// Owning tile
    pub tile: TileCoord,
    /// Pixel X
    pub x: f64,
    /// Pixel Y
    pub y: f64,
    /// Collision radius in pixels
    pub collision_radius: Option<f64>,
    /// Opaque key-value data carried from the overlay
    pub metadata: BTreeMap<String, String>,
}

impl PlacedObject {
    /// Creates a procedural object with no metadata.
    #[must_use]
    pub fn new(kind: ObjectKind, tile: TileCoord, (x, y): (f64, f64)) -> Self {
        let collision_radius = kind.collision_radius();
        Self {
            kind,
            tile,
            x,
            y,
            collision_radius,
            metadata: BTreeMap::new(),
        }
    }

    /// Creates an object from an overlay entity.
    #[must_use]
    pub fn from_entity(entity: &PlacedEntity, tile: TileCoord, position: (f64, f64)) -> Self {
        let mut object = Self::new(ObjectKind::from_kind(&entity.kind), tile, position);
        object.metadata.clone_from(&entity.metadata);
        object
    }
}

/// A chunk materialized from procedural output merged with overlay data.
#[derive(Debug, Clone)]
pub struct Chunk {
    coord: ChunkCoord,
    pixel_origin: (f64, f64),
    tile_bounds: TileBounds,
    terrain: TerrainKind,
    tiles: Vec<Tile>,
    objects: Vec<PlacedObject>,
    overridden_cells: BTreeSet<CellCoord>,
}

impl Chunk {
    /// Creates an empty chunk.
    #[must_use]
    pub fn new(
        coord: ChunkCoord,
        pixel_origin: (f64, f64),
        tile_bounds: TileBounds,
        terrain: TerrainKind,
    ) -> Self {
        Self {
            coord,
            pixel_origin,
            tile_bounds,
            terrain,
            tiles: Vec::with_capacity(tile_bounds.area()),
            objects: Vec::new(),
            overridden_cells: BTreeSet::new(),
        }
    }

    /// Returns the chunk coordinate.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Top-left pixel of the chunk.
    #[must_use]
    pub const fn pixel_origin(&self) -> (f64, f64) {
        self.pixel_origin
    }

    /// Tiles covered by the chunk.
    #[must_use]
    pub const fn tile_bounds(&self) -> TileBounds {
        self.tile_bounds
    }

    /// Biome of the chunk.
    #[must_use]
    pub const fn terrain(&self) -> TerrainKind {
        self.terrain
    }

    /// Tiles in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// All placed objects.
    #[must_use]
    pub fn objects(&self) -> &[PlacedObject] {
        &self.objects
    }

    /// Cells whose content comes from the overlay.
    #[must_use]
    pub const fn overridden_cells(&self) -> &BTreeSet<CellCoord> {
        &self.overridden_cells
    }

    pub(crate) fn push_tile(&mut self, tile: Tile) {
        self.tiles.push(tile);
    }

    pub(crate) fn push_object(&mut self, object: PlacedObject) {
        self.objects.push(object);
    }

    /// Gets a tile by its canonical coordinate.
    #[must_use]
    pub fn tile_at(&self, tile: TileCoord) -> Option<&Tile> {
        if !self.tile_bounds.contains(tile) {
            return None;
        }
        let local_x = (tile.x - self.tile_bounds.min.x) as usize;
        let local_y = (tile.y - self.tile_bounds.min.y) as usize;
        self.tiles
            .get(local_y * self.tile_bounds.width() as usize + local_x)
    }

    /// Objects on the given tile.
    pub fn objects_at(&self, tile: TileCoord) -> impl Iterator<Item = &PlacedObject> {
        self.objects.iter().filter(move |o| o.tile == tile)
    }

    /// Checks whether a cell's content comes from the overlay.
    #[must_use]
    pub fn is_overridden(&self, cell: CellCoord) -> bool {
        self.overridden_cells.contains(&cell)
    }

    /// Replaces procedural content with overlay records.
    ///
    /// Every cell present in `overrides` loses all of its procedural objects
    /// and gains exactly the recorded entities, even when the list is empty.
    pub fn apply_overrides(
        &mut self,
        overrides: &ChunkOverrides,
        chunk_size: u32,
        tile_size: u32,
    ) {
        let half = f64::from(tile_size) / 2.0;
        let size = f64::from(tile_size);
        for (cell, entities) in overrides {
            let tile = self.coord.cell_to_tile(*cell, chunk_size);
            if !self.tile_bounds.contains(tile) {
                warn!(
                    "Ignoring override for cell ({}, {}) outside chunk {}",
                    cell.x, cell.y, self.coord
                );
                continue;
            }
            self.objects.retain(|o| o.tile != tile);
            let center = (
                f64::from(tile.x) * size + half,
                f64::from(tile.y) * size + half,
            );
            self.objects.extend(
                entities
                    .iter()
                    .map(|entity| PlacedObject::from_entity(entity, tile, center)),
            );
            self.overridden_cells.insert(*cell);
        }
    }

    /// Objects drawn in the chunk's own pass: grass first, then the other
    /// flat objects in placement order. Upright objects are left out.
    #[must_use]
    pub fn flat_draw_order(&self) -> Vec<&PlacedObject> {
        let (mut grass, rest): (Vec<&PlacedObject>, Vec<&PlacedObject>) = self
            .objects
            .iter()
            .filter(|o| !o.kind.is_depth_sorted())
            .partition(|o| o.kind == ObjectKind::Grass);
        grass.extend(rest);
        grass
    }

    /// Upright objects, unsorted. The caller orders them across chunks.
    pub fn upright_objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.iter().filter(|o| o.kind.is_depth_sorted())
    }
}
