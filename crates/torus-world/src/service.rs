//! World state orchestration.
//!
//! [`WorldStateService`] is the single entry point the rest of a game talks
//! to. Reads flow culler -> cache -> generator + overlay; writes go to the
//! overlay and then invalidate the owning chunk before returning, so the
//! next read always reflects the edit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use torus_common::{CellCoord, ChunkCoord, WorldConfig, WorldError, WorldId, WorldResult};
use tracing::{debug, info, warn};

use crate::cache::ChunkCache;
use crate::chunk::{Chunk, ObjectKind};
use crate::culling::{CameraRect, VisibilityCuller};
use crate::generation::ProceduralGenerator;
use crate::geometry::WorldGeometry;
use crate::overlay::{
    remove_kind, CellAddress, OverlayStats, OverlayStore, PlacedEntity, WorldRecord,
};

/// Default eviction radius in chunks.
pub const DEFAULT_KEEP_DISTANCE: u32 = 2;

/// A materialized chunk and where to draw it.
#[derive(Debug, Clone)]
pub struct VisibleChunk {
    /// The chunk
    pub chunk: Arc<Chunk>,
    /// Pixel translation from the chunk's native position
    pub offset: (f64, f64),
}

/// Summary of a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldInfo {
    /// World identifier
    pub world_id: WorldId,
    /// World size in pixels
    pub size_pixels: (f64, f64),
    /// World size in tiles
    pub size_tiles: (u32, u32),
    /// Tile edge in pixels
    pub tile_size: u32,
    /// Chunk edge in tiles
    pub chunk_size: u32,
    /// Chunks per axis
    pub chunk_count: (u32, u32),
    /// Seed
    pub seed: u64,
    /// Spawn point in pixels
    pub starting_position: (f64, f64),
    /// Resident chunks
    pub loaded_chunks: usize,
}

impl std::fmt::Display for WorldInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "world {}: {}x{} pixels, {}x{} tiles of {}px, {}x{} chunks of {} tiles, seed {}, \
             start ({}, {}), {} chunks loaded",
            self.world_id,
            self.size_pixels.0,
            self.size_pixels.1,
            self.size_tiles.0,
            self.size_tiles.1,
            self.tile_size,
            self.chunk_count.0,
            self.chunk_count.1,
            self.chunk_size,
            self.seed,
            self.starting_position.0,
            self.starting_position.1,
            self.loaded_chunks
        )
    }
}

/// Composes geometry, generation, caching, culling and the overlay store.
pub struct WorldStateService {
    world_id: WorldId,
    config: WorldConfig,
    geometry: WorldGeometry,
    generator: Arc<ProceduralGenerator>,
    cache: ChunkCache,
    culler: VisibilityCuller,
    overlay: Arc<dyn OverlayStore>,
    keep_distance: u32,
}

impl WorldStateService {
    /// Creates a service, registering the world on first use.
    ///
    /// Fails if the configuration is invalid, or if the store already knows
    /// this world under a different configuration.
    pub fn new(
        world_id: WorldId,
        config: WorldConfig,
        overlay: Arc<dyn OverlayStore>,
    ) -> WorldResult<Self> {
        let geometry = WorldGeometry::new(&config)?;
        let generator = Arc::new(ProceduralGenerator::from_world(&config)?);
        match overlay.world_record(world_id)? {
            Some(record) => {
                if let Some(field) = record.config.differing_field(&config) {
                    return Err(WorldError::ConfigMismatch {
                        world: world_id,
                        field,
                    });
                }
            },
            None => {
                overlay.save_world_record(&WorldRecord::new(world_id, config.clone()))?;
                info!("Created world {}", world_id);
            },
        }
        let cache = ChunkCache::new(
            world_id,
            geometry,
            Arc::clone(&generator),
            Arc::clone(&overlay),
        );
        info!(
            "World {} ready: {}x{} tiles, {}x{} chunks, seed {}",
            world_id,
            config.grid_width_tiles,
            config.grid_height_tiles,
            config.chunks_x(),
            config.chunks_y(),
            config.seed
        );
        Ok(Self {
            world_id,
            config,
            geometry,
            generator,
            cache,
            culler: VisibilityCuller::new(geometry),
            overlay,
            keep_distance: DEFAULT_KEEP_DISTANCE,
        })
    }

    /// Reopens a world with the configuration it was created with.
    pub fn open(world_id: WorldId, overlay: Arc<dyn OverlayStore>) -> WorldResult<Self> {
        let record = overlay
            .world_record(world_id)?
            .ok_or(WorldError::UnknownWorld(world_id))?;
        Self::new(world_id, record.config, overlay)
    }

    /// Sets the eviction radius used by [`WorldStateService::tick`].
    #[must_use]
    pub fn with_keep_distance(mut self, keep_distance: u32) -> Self {
        self.keep_distance = keep_distance;
        self
    }

    /// World identifier.
    #[must_use]
    pub const fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Coordinate conversions for this world.
    #[must_use]
    pub const fn geometry(&self) -> &WorldGeometry {
        &self.geometry
    }

    /// The chunk cache.
    #[must_use]
    pub const fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Gets the materialized chunk at a (possibly unwrapped) coordinate.
    pub fn materialized_chunk(&self, cx: i32, cy: i32) -> WorldResult<Arc<Chunk>> {
        self.cache.get(cx, cy)
    }

    /// Materializes everything the camera can see, one entry per drawn instance.
    pub fn visible_area(&self, camera: &CameraRect) -> WorldResult<Vec<VisibleChunk>> {
        self.culler
            .render_plan(camera)
            .into_iter()
            .map(|instance| {
                Ok(VisibleChunk {
                    chunk: self.cache.get(instance.coord.x, instance.coord.y)?,
                    offset: instance.offset,
                })
            })
            .collect()
    }

    /// Calls `draw` once per object per visible chunk instance, with
    /// positions translated into the camera's world copy. Flat objects are
    /// drawn chunk by chunk; upright objects of every visible chunk follow,
    /// farthest down the screen first. Returns the number of calls.
    pub fn draw_visible<F>(&self, camera: &CameraRect, mut draw: F) -> WorldResult<usize>
    where
        F: FnMut(&ObjectKind, f64, f64),
    {
        let visible = self.visible_area(camera)?;
        let mut calls = 0;
        let mut upright = Vec::new();
        for instance in &visible {
            let (dx, dy) = instance.offset;
            for object in instance.chunk.flat_draw_order() {
                draw(&object.kind, object.x + dx, object.y + dy);
                calls += 1;
            }
            upright.extend(
                instance
                    .chunk
                    .upright_objects()
                    .map(|o| (&o.kind, o.x + dx, o.y + dy)),
            );
        }
        upright.sort_by(|a, b| b.2.total_cmp(&a.2));
        for (kind, x, y) in upright {
            draw(kind, x, y);
            calls += 1;
        }
        Ok(calls)
    }

    fn address_at(&self, px: f64, py: f64) -> CellAddress {
        let (chunk, cell) = self.geometry.pixel_to_cell(px, py);
        CellAddress::new(self.world_id, chunk, cell)
    }

    fn write(&self, addr: &CellAddress, entities: Vec<PlacedEntity>) -> WorldResult<()> {
        let count = entities.len();
        self.overlay.set_cell_override(addr, entities)?;
        self.cache.invalidate(addr.chunk.x, addr.chunk.y);
        debug!("Edited {} ({} entities)", addr, count);
        Ok(())
    }

    /// Replaces the contents of the cell under a world pixel.
    pub fn edit_cell(
        &self,
        px: f64,
        py: f64,
        entities: Vec<PlacedEntity>,
    ) -> WorldResult<CellAddress> {
        let addr = self.address_at(px, py);
        self.write(&addr, entities)?;
        Ok(addr)
    }

    /// Replaces the contents of a cell addressed by chunk and offset.
    ///
    /// Offsets outside the chunk, or past the grid edge in a partial chunk,
    /// are rejected.
    pub fn set_cell_override(
        &self,
        cx: i32,
        cy: i32,
        cell_x: i64,
        cell_y: i64,
        entities: Vec<PlacedEntity>,
    ) -> WorldResult<CellAddress> {
        let chunk = self.geometry.wrap_chunk(ChunkCoord::new(cx, cy));
        let bounds = self.geometry.chunk_tile_bounds(chunk);
        let out_of_range = || WorldError::CellOutOfRange {
            cell_x,
            cell_y,
            chunk_size: self.geometry.chunk_size(),
        };
        let x = u16::try_from(cell_x).map_err(|_| out_of_range())?;
        let y = u16::try_from(cell_y).map_err(|_| out_of_range())?;
        let cell = CellCoord::new(x, y);
        if !cell.is_within(self.geometry.chunk_size())
            || !bounds.contains(self.geometry.cell_to_tile(chunk, cell))
        {
            return Err(out_of_range());
        }

        let addr = CellAddress::new(self.world_id, chunk, cell);
        self.write(&addr, entities)?;
        Ok(addr)
    }

    /// Live contents of the cell under a world pixel: the overlay record if
    /// there is one, otherwise the procedural objects.
    pub fn cell_contents(&self, px: f64, py: f64) -> WorldResult<Vec<PlacedEntity>> {
        let addr = self.address_at(px, py);
        if let Some(entities) = self.overlay.cell_override(&addr)? {
            return Ok(entities);
        }
        let chunk = self.cache.get(addr.chunk.x, addr.chunk.y)?;
        let tile = self.geometry.cell_to_tile(addr.chunk, addr.cell);
        Ok(chunk
            .objects_at(tile)
            .filter(|o| o.kind != ObjectKind::Marker)
            .map(|o| PlacedEntity {
                kind: o.kind.as_str().to_string(),
                metadata: o.metadata.clone(),
            })
            .collect())
    }

    /// Adds an entity to a cell, keeping whatever already occupies it.
    pub fn place_entity(&self, px: f64, py: f64, entity: PlacedEntity) -> WorldResult<CellAddress> {
        let mut entities = self.cell_contents(px, py)?;
        entities.push(entity);
        self.edit_cell(px, py, entities)
    }

    /// Removes every entity of `kind` from a cell. Returns whether anything
    /// was removed; nothing is written otherwise.
    pub fn harvest_entity(&self, px: f64, py: f64, kind: &str) -> WorldResult<bool> {
        let mut entities = self.cell_contents(px, py)?;
        if !remove_kind(&mut entities, kind) {
            return Ok(false);
        }
        self.edit_cell(px, py, entities)?;
        Ok(true)
    }

    /// Drops the record for a cell so it shows procedural content again.
    pub fn revert_cell(&self, px: f64, py: f64) -> WorldResult<bool> {
        let addr = self.address_at(px, py);
        let existed = self.overlay.clear_cell_override(&addr)?;
        self.cache.invalidate(addr.chunk.x, addr.chunk.y);
        Ok(existed)
    }

    /// Evicts chunks far from a world pixel. Returns the number evicted.
    pub fn tick(&self, ref_px: f64, ref_py: f64) -> usize {
        let (px, py) = self.geometry.wrap_pixel(ref_px, ref_py);
        self.cache
            .evict_far(self.geometry.pixel_to_tile(px, py), self.keep_distance)
    }

    /// Applies a new configuration, rewrites the world's record and drops
    /// every cached chunk. Existing overlay records keep their cell
    /// addresses and so land on whatever tiles those map to now.
    pub fn reconfigure(&mut self, config: WorldConfig) -> WorldResult<()> {
        let geometry = WorldGeometry::new(&config)?;
        let generator = Arc::new(ProceduralGenerator::from_world(&config)?);
        let record = match self.overlay.world_record(self.world_id)? {
            Some(record) => WorldRecord {
                config: config.clone(),
                ..record
            },
            None => WorldRecord::new(self.world_id, config.clone()),
        };
        self.overlay.save_world_record(&record)?;
        if let Some(field) = self.config.differing_field(&config) {
            warn!(
                "World {} changed {}; existing overlay records now address different tiles",
                self.world_id, field
            );
        }
        self.cache.invalidate_all();
        self.cache = ChunkCache::new(
            self.world_id,
            geometry,
            Arc::clone(&generator),
            Arc::clone(&self.overlay),
        );
        self.culler = VisibilityCuller::new(geometry);
        self.geometry = geometry;
        self.generator = generator;
        self.config = config;
        info!(
            "World {} reconfigured: seed {}, {}x{} tiles, chunk size {}",
            self.world_id,
            self.config.seed,
            self.config.grid_width_tiles,
            self.config.grid_height_tiles,
            self.config.chunk_size_tiles
        );
        Ok(())
    }

    /// Spawn point in pixels.
    #[must_use]
    pub fn starting_position(&self) -> (f64, f64) {
        self.generator.starting_position()
    }

    /// Summary of the world.
    #[must_use]
    pub fn info(&self) -> WorldInfo {
        WorldInfo {
            world_id: self.world_id,
            size_pixels: self.geometry.world_size_pixels(),
            size_tiles: self.geometry.grid_size(),
            tile_size: self.geometry.tile_size(),
            chunk_size: self.geometry.chunk_size(),
            chunk_count: self.geometry.chunk_count(),
            seed: self.config.seed,
            starting_position: self.starting_position(),
            loaded_chunks: self.cache.len(),
        }
    }

    /// Overlay totals.
    pub fn overlay_stats(&self) -> WorldResult<OverlayStats> {
        self.overlay.stats().map_err(WorldError::from)
    }
}
