//! Chunk cache with lazy materialization and distance-based eviction.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use torus_common::{ChunkCoord, TileCoord, WorldError, WorldId, WorldResult};
use tracing::{debug, warn};

use crate::chunk::{Chunk, ObjectKind, PlacedObject};
use crate::generation::ProceduralGenerator;
use crate::geometry::WorldGeometry;
use crate::overlay::OverlayStore;

/// Materialized chunks keyed by canonical chunk coordinate.
pub struct ChunkCache {
    world: WorldId,
    geometry: WorldGeometry,
    generator: Arc<ProceduralGenerator>,
    overlay: Arc<dyn OverlayStore>,
    chunks: DashMap<ChunkCoord, Arc<Chunk>>,
}

impl ChunkCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(
        world: WorldId,
        geometry: WorldGeometry,
        generator: Arc<ProceduralGenerator>,
        overlay: Arc<dyn OverlayStore>,
    ) -> Self {
        Self {
            world,
            geometry,
            generator,
            overlay,
            chunks: DashMap::new(),
        }
    }

    /// Gets a chunk, materializing it on a miss.
    ///
    /// Materialization runs under the entry lock, so concurrent callers for
    /// one coordinate see a single build. A failed build caches nothing.
    pub fn get(&self, cx: i32, cy: i32) -> WorldResult<Arc<Chunk>> {
        let coord = self.geometry.wrap_chunk(ChunkCoord::new(cx, cy));
        match self.chunks.entry(coord) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let chunk = Arc::new(self.materialize(coord)?);
                entry.insert(Arc::clone(&chunk));
                Ok(chunk)
            },
        }
    }

    fn materialize(&self, coord: ChunkCoord) -> WorldResult<Chunk> {
        let overrides = self
            .overlay
            .chunk_overrides(self.world, coord)
            .map_err(|source| {
                warn!("Overlay read failed for chunk {coord}: {source}");
                WorldError::MaterializationFailed {
                    x: coord.x,
                    y: coord.y,
                    source,
                }
            })?;

        let mut chunk = self.generator.generate_chunk(coord);
        chunk.apply_overrides(
            &overrides,
            self.geometry.chunk_size(),
            self.geometry.tile_size(),
        );

        let start = self.generator.starting_tile();
        if chunk.tile_bounds().contains(start) {
            chunk.push_object(PlacedObject::new(
                ObjectKind::Marker,
                start,
                self.geometry.tile_to_pixel_center(start),
            ));
        }

        debug!(
            "Materialized chunk {} ({} tiles, {} objects, {} overridden cells)",
            coord,
            chunk.tiles().len(),
            chunk.objects().len(),
            overrides.len()
        );
        Ok(chunk)
    }

    /// Drops one chunk so the next `get` rebuilds it.
    pub fn invalidate(&self, cx: i32, cy: i32) -> bool {
        let coord = self.geometry.wrap_chunk(ChunkCoord::new(cx, cy));
        self.chunks.remove(&coord).is_some()
    }

    /// Drops every chunk.
    pub fn invalidate_all(&self) {
        self.chunks.clear();
    }

    /// Drops chunks farther than `keep_distance` chunks from the reference
    /// tile, measured as Chebyshev distance around the torus. Returns the
    /// number removed.
    pub fn evict_far(&self, reference: TileCoord, keep_distance: u32) -> usize {
        let (reference_chunk, _) = self.geometry.tile_to_cell(reference);
        let before = self.chunks.len();
        self.chunks.retain(|coord, _| {
            self.geometry.chunk_distance(*coord, reference_chunk) <= keep_distance
        });
        let evicted = before.saturating_sub(self.chunks.len());
        if evicted > 0 {
            debug!("Evicted {evicted} chunks around {reference_chunk}");
        }
        evicted
    }

    /// Checks whether a chunk is resident.
    #[must_use]
    pub fn is_cached(&self, cx: i32, cy: i32) -> bool {
        self.chunks
            .contains_key(&self.geometry.wrap_chunk(ChunkCoord::new(cx, cy)))
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns whether no chunks are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Resident chunk coordinates, sorted.
    #[must_use]
    pub fn cached_coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<_> = self.chunks.iter().map(|e| *e.key()).collect();
        coords.sort_unstable();
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{
        CellAddress, ChunkOverrides, MemoryOverlayStore, OverlayStats, PlacedEntity, WorldRecord,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use torus_common::{CellCoord, OverlayError, OverlayResult, WorldConfig};

    fn cache_for(config: &WorldConfig, overlay: Arc<dyn OverlayStore>) -> ChunkCache {
        let generator = ProceduralGenerator::from_world(config).expect("valid config");
        let geometry = WorldGeometry::new(config).expect("valid config");
        ChunkCache::new(WorldId::default(), geometry, Arc::new(generator), overlay)
    }

    struct FailingStore;

    impl OverlayStore for FailingStore {
        fn chunk_overrides(&self, _: WorldId, _: ChunkCoord) -> OverlayResult<ChunkOverrides> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn set_cell_override(&self, _: &CellAddress, _: Vec<PlacedEntity>) -> OverlayResult<()> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn clear_cell_override(&self, _: &CellAddress) -> OverlayResult<bool> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn add_entity(&self, _: &CellAddress, _: PlacedEntity) -> OverlayResult<()> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn remove_entity(&self, _: &CellAddress, _: &str) -> OverlayResult<bool> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn stats(&self) -> OverlayResult<OverlayStats> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn world_record(&self, _: WorldId) -> OverlayResult<Option<WorldRecord>> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn save_world_record(&self, _: &WorldRecord) -> OverlayResult<()> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn worlds(&self) -> OverlayResult<Vec<WorldRecord>> {
            Err(OverlayError::Unavailable("offline".into()))
        }
        fn delete_world(&self, _: WorldId) -> OverlayResult<bool> {
            Err(OverlayError::Unavailable("offline".into()))
        }
    }

    /// Counts chunk reads and makes each one slow enough for callers to overlap.
    #[derive(Default)]
    struct SlowCountingStore {
        inner: MemoryOverlayStore,
        reads: AtomicUsize,
    }

    impl OverlayStore for SlowCountingStore {
        fn chunk_overrides(&self, world: WorldId, chunk: ChunkCoord) -> OverlayResult<ChunkOverrides> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(25));
            self.inner.chunk_overrides(world, chunk)
        }
        fn set_cell_override(&self, addr: &CellAddress, e: Vec<PlacedEntity>) -> OverlayResult<()> {
            self.inner.set_cell_override(addr, e)
        }
        fn clear_cell_override(&self, addr: &CellAddress) -> OverlayResult<bool> {
            self.inner.clear_cell_override(addr)
        }
        fn add_entity(&self, addr: &CellAddress, e: PlacedEntity) -> OverlayResult<()> {
            self.inner.add_entity(addr, e)
        }
        fn remove_entity(&self, addr: &CellAddress, kind: &str) -> OverlayResult<bool> {
            self.inner.remove_entity(addr, kind)
        }
        fn stats(&self) -> OverlayResult<OverlayStats> {
            self.inner.stats()
        }
        fn world_record(&self, world: WorldId) -> OverlayResult<Option<WorldRecord>> {
            self.inner.world_record(world)
        }
        fn save_world_record(&self, record: &WorldRecord) -> OverlayResult<()> {
            self.inner.save_world_record(record)
        }
        fn worlds(&self) -> OverlayResult<Vec<WorldRecord>> {
            self.inner.worlds()
        }
        fn delete_world(&self, world: WorldId) -> OverlayResult<bool> {
            self.inner.delete_world(world)
        }
    }

    #[test]
    fn test_concurrent_gets_materialize_once() {
        let store = Arc::new(SlowCountingStore::default());
        let cache = cache_for(&WorldConfig::default(), store.clone());

        let chunks: Vec<Arc<Chunk>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = &cache;
                    // Half the callers use the unwrapped alias of the same chunk
                    scope.spawn(move || {
                        if i % 2 == 0 {
                            cache.get(3, 2)
                        } else {
                            cache.get(10, -5)
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread panicked").expect("materialize"))
                .collect()
        });

        assert_eq!(store.reads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert!(chunks.iter().all(|c| Arc::ptr_eq(c, &chunks[0])));
    }

    #[test]
    fn test_get_wraps_and_caches() {
        let cache = cache_for(&WorldConfig::default(), Arc::new(MemoryOverlayStore::new()));
        let a = cache.get(-1, 0).expect("materialize");
        assert_eq!(a.coord(), ChunkCoord::new(6, 0));
        let b = cache.get(6, 7).expect("materialize");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache.is_cached(13, -7));
    }

    #[test]
    fn test_overlay_merged() {
        let store = Arc::new(MemoryOverlayStore::new());
        store
            .set_cell_override(
                &CellAddress::new(WorldId::default(), ChunkCoord::new(0, 0), CellCoord::new(12, 0)),
                vec![PlacedEntity::new("rock")],
            )
            .expect("write");
        let cache = cache_for(&WorldConfig::default(), store);
        let chunk = cache.get(0, 0).expect("materialize");
        let kinds: Vec<_> = chunk
            .objects_at(TileCoord::new(12, 0))
            .map(|o| o.kind.clone())
            .collect();
        // The procedural tree is gone, only the recorded rock remains
        assert_eq!(kinds, vec![ObjectKind::Rock]);
    }

    #[test]
    fn test_marker_in_spawn_chunk() {
        let cache = cache_for(&WorldConfig::default(), Arc::new(MemoryOverlayStore::new()));
        let spawn = cache.get(5, 5).expect("materialize");
        let markers: Vec<_> = spawn
            .objects()
            .iter()
            .filter(|o| o.kind == ObjectKind::Marker)
            .collect();
        assert_eq!(markers.len(), 1);
        assert_eq!((markers[0].x, markers[0].y), (3820.0, 3660.0));

        let other = cache.get(0, 0).expect("materialize");
        assert!(other.objects().iter().all(|o| o.kind != ObjectKind::Marker));
    }

    #[test]
    fn test_failed_materialization_not_cached() {
        let cache = cache_for(&WorldConfig::default(), Arc::new(FailingStore));
        let err = cache.get(2, 3).expect_err("store is offline");
        assert!(matches!(
            err,
            WorldError::MaterializationFailed { x: 2, y: 3, .. }
        ));
        assert!(!cache.is_cached(2, 3));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = cache_for(&WorldConfig::default(), Arc::new(MemoryOverlayStore::new()));
        cache.get(1, 1).expect("materialize");
        cache.get(2, 2).expect("materialize");
        assert!(cache.invalidate(8, 1));
        assert!(!cache.invalidate(1, 1));
        assert_eq!(cache.cached_coords(), vec![ChunkCoord::new(2, 2)]);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_far_boundary() {
        // 64 chunks per axis, so distances up to 10 never wrap
        let config = WorldConfig {
            grid_width_tiles: 64 * 4,
            grid_height_tiles: 64 * 4,
            chunk_size_tiles: 4,
            ..WorldConfig::default()
        };
        let cache = cache_for(&config, Arc::new(MemoryOverlayStore::new()));
        let reference = ChunkCoord::new(20, 20);
        for d in 0..=10 {
            cache.get(reference.x + d, reference.y).expect("materialize");
        }

        let evicted = cache.evict_far(TileCoord::new(20 * 4 + 1, 20 * 4 + 3), 5);
        assert_eq!(evicted, 5);
        let kept: Vec<i32> = cache.cached_coords().iter().map(|c| c.x - reference.x).collect();
        assert_eq!(kept, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_evict_far_across_seam() {
        let cache = cache_for(&WorldConfig::default(), Arc::new(MemoryOverlayStore::new()));
        cache.get(6, 0).expect("materialize");
        cache.get(3, 0).expect("materialize");
        // Tile (0, 0) is chunk (0, 0); chunk 6 is one step away across the seam
        assert_eq!(cache.evict_far(TileCoord::new(0, 0), 1), 1);
        assert_eq!(cache.cached_coords(), vec![ChunkCoord::new(6, 0)]);
    }
}
