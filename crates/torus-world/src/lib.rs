//! # Torus World
//!
//! World management for Project Torus.
//!
//! This crate handles:
//! - Pixel/tile/chunk conversion and wrapping on a toroidal world
//! - Seeded procedural generation of tiles and static objects
//! - Chunk caching with distance-based eviction
//! - Visibility culling across world edges
//! - Persistent per-cell overlays (in memory or on disk)
//! - The world state service composing all of the above

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod cache;
pub mod chunk;
pub mod culling;
pub mod generation;
pub mod geometry;
pub mod overlay;
pub mod overlay_file;
pub mod service;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cache::*;
    pub use crate::chunk::*;
    pub use crate::culling::*;
    pub use crate::generation::*;
    pub use crate::geometry::*;
    pub use crate::overlay::*;
    pub use crate::overlay_file::*;
    pub use crate::service::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use torus_common::{ChunkCoord, TileCoord, WorldConfig, WorldId};

    #[test]
    fn test_chunk_materialization() {
        let service = WorldStateService::new(
            WorldId::default(),
            WorldConfig::default(),
            Arc::new(MemoryOverlayStore::new()),
        )
        .expect("valid config");
        let chunk = service.materialized_chunk(3, 4).expect("materialize");
        assert_eq!(chunk.coord(), ChunkCoord::new(3, 4));
        assert_eq!(chunk.pixel_origin(), (1920.0, 2560.0));
        assert_eq!(chunk.tiles().len(), 256);
    }

    #[test]
    fn test_generation_repeatable_across_instances() {
        let a = ProceduralGenerator::from_world(&WorldConfig::with_seed(9001)).expect("valid");
        let b = ProceduralGenerator::from_world(&WorldConfig::with_seed(9001)).expect("valid");
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(6, 2)] {
            assert_eq!(
                a.generate_chunk(coord).objects(),
                b.generate_chunk(coord).objects()
            );
        }
    }

    proptest! {
        #[test]
        fn prop_wrapped_tiles_land_in_their_chunk(x in -1_000i32..1_000, y in -1_000i32..1_000) {
            let geometry = WorldGeometry::new(&WorldConfig::default()).expect("valid config");
            let (chunk, cell) = geometry.tile_to_cell(TileCoord::new(x, y));
            let tile = geometry.cell_to_tile(chunk, cell);
            prop_assert!(geometry.chunk_tile_bounds(chunk).contains(tile));
            prop_assert_eq!(tile, geometry.wrap_tile(TileCoord::new(x, y)));
        }
    }
}
