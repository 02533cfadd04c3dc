//! Visibility culling on the torus.
//!
//! A camera rectangle may straddle a world edge or be larger than the world
//! itself. Its tile span is split into one segment per world copy it
//! touches; each segment maps onto canonical chunks plus the pixel
//! translation of that copy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use torus_common::ChunkCoord;

use crate::geometry::WorldGeometry;

/// Upper bound on world copies drawn along one axis.
pub const MAX_WORLD_COPIES: i64 = 8;

/// Camera view in world pixels, positioned by its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRect {
    /// Centre X
    pub center_x: f64,
    /// Centre Y
    pub center_y: f64,
    /// View width
    pub width: f64,
    /// View height
    pub height: f64,
}

impl CameraRect {
    /// Creates a camera rectangle.
    #[must_use]
    pub const fn new(center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        Self {
            center_x,
            center_y,
            width,
            height,
        }
    }

    /// Left edge.
    #[must_use]
    pub fn left(&self) -> f64 {
        self.center_x - self.width / 2.0
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.center_x + self.width / 2.0
    }

    /// Top edge.
    #[must_use]
    pub fn top(&self) -> f64 {
        self.center_y - self.height / 2.0
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.center_y + self.height / 2.0
    }

    /// Finite position and non-negative size.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.center_x.is_finite()
            && self.center_y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// A chunk to draw, translated by `offset` from its native pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkInstance {
    /// Canonical chunk coordinate
    pub coord: ChunkCoord,
    /// Pixel translation (a multiple of the world size)
    pub offset: (f64, f64),
}

/// Chunks of one world copy along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisSegment {
    copy: i64,
    first_chunk: i32,
    last_chunk: i32,
}

/// Computes which chunks a camera can see.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityCuller {
    geometry: WorldGeometry,
}

impl VisibilityCuller {
    /// Creates a culler for the given world.
    #[must_use]
    pub const fn new(geometry: WorldGeometry) -> Self {
        Self { geometry }
    }

    /// Canonical chunks touched by the camera, deduplicated and sorted.
    #[must_use]
    pub fn visible_chunks(&self, camera: &CameraRect) -> Vec<ChunkCoord> {
        let chunks: BTreeSet<ChunkCoord> = self
            .render_plan(camera)
            .into_iter()
            .map(|instance| instance.coord)
            .collect();
        chunks.into_iter().collect()
    }

    /// Non-zero pixel translations of the world copies the camera touches.
    #[must_use]
    pub fn wrap_offsets(&self, camera: &CameraRect) -> Vec<(f64, f64)> {
        let Some((xs, ys)) = self.segments(camera) else {
            return Vec::new();
        };
        let (width, height) = self.geometry.world_size_pixels();
        let mut offsets = Vec::new();
        for y in &ys {
            for x in &xs {
                if x.copy == 0 && y.copy == 0 {
                    continue;
                }
                offsets.push((x.copy as f64 * width, y.copy as f64 * height));
            }
        }
        offsets
    }

    /// Every chunk instance to draw, one per world copy it appears in.
    #[must_use]
    pub fn render_plan(&self, camera: &CameraRect) -> Vec<ChunkInstance> {
        let Some((xs, ys)) = self.segments(camera) else {
            return Vec::new();
        };
        let (width, height) = self.geometry.world_size_pixels();
        let mut plan = Vec::new();
        for y in &ys {
            for x in &xs {
                let offset = (x.copy as f64 * width, y.copy as f64 * height);
                for cy in y.first_chunk..=y.last_chunk {
                    for cx in x.first_chunk..=x.last_chunk {
                        plan.push(ChunkInstance {
                            coord: ChunkCoord::new(cx, cy),
                            offset,
                        });
                    }
                }
            }
        }
        plan
    }

    fn segments(&self, camera: &CameraRect) -> Option<(Vec<AxisSegment>, Vec<AxisSegment>)> {
        if !camera.is_valid() {
            return None;
        }
        let tile = f64::from(self.geometry.tile_size());
        let (grid_w, grid_h) = self.geometry.grid_size();
        let chunk = i64::from(self.geometry.chunk_size());

        let xs = axis_segments(
            (camera.left() / tile).floor(),
            (camera.right() / tile).floor(),
            (camera.center_x / tile).floor(),
            i64::from(grid_w),
            chunk,
        );
        let ys = axis_segments(
            (camera.top() / tile).floor(),
            (camera.bottom() / tile).floor(),
            (camera.center_y / tile).floor(),
            i64::from(grid_h),
            chunk,
        );
        Some((xs, ys))
    }
}

/// Splits the inclusive tile span `[first, last]` into per-copy chunk ranges.
fn axis_segments(first: f64, last: f64, center: f64, grid: i64, chunk: i64) -> Vec<AxisSegment> {
    // Float-to-int casts saturate, so absurd cameras stay bounded here
    let first = first as i64;
    let last = last as i64;
    let mut first_copy = first.div_euclid(grid);
    let mut last_copy = last.div_euclid(grid);
    if last_copy.saturating_sub(first_copy) >= MAX_WORLD_COPIES {
        let center_copy = (center as i64).div_euclid(grid);
        first_copy = center_copy - MAX_WORLD_COPIES / 2;
        last_copy = first_copy + MAX_WORLD_COPIES - 1;
    }

    (first_copy..=last_copy)
        .map(|copy| {
            let base = copy.saturating_mul(grid);
            let lo = first.max(base).saturating_sub(base).min(grid - 1);
            let hi = last
                .min(base.saturating_add(grid - 1))
                .saturating_sub(base)
                .clamp(0, grid - 1);
            AxisSegment {
                copy,
                first_chunk: (lo / chunk) as i32,
                last_chunk: (hi / chunk) as i32,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use torus_common::WorldConfig;

    fn reference_culler() -> VisibilityCuller {
        VisibilityCuller::new(WorldGeometry::new(&WorldConfig::default()).expect("valid config"))
    }

    #[test]
    fn test_interior_view() {
        let culler = reference_culler();
        // Tiles 15..=24 horizontally and vertically => chunks 0 and 1
        let camera = CameraRect::new(800.0, 800.0, 380.0, 380.0);
        let chunks = culler.visible_chunks(&camera);
        assert_eq!(
            chunks,
            vec![
                ChunkCoord::new(0, 0),
                ChunkCoord::new(0, 1),
                ChunkCoord::new(1, 0),
                ChunkCoord::new(1, 1),
            ]
        );
        assert!(culler.wrap_offsets(&camera).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let culler = reference_culler();
        let camera = CameraRect::new(-35.5, 3990.0, 1280.0, 720.0);
        assert_eq!(culler.visible_chunks(&camera), culler.visible_chunks(&camera));
        assert_eq!(culler.render_plan(&camera), culler.render_plan(&camera));
    }

    #[test]
    fn test_view_across_left_seam() {
        let culler = reference_culler();
        // Spans x in [-100, 100]: tiles -3..=2
        let camera = CameraRect::new(0.0, 2000.0, 200.0, 40.0);
        let chunks = culler.visible_chunks(&camera);
        assert!(chunks.contains(&ChunkCoord::new(0, 3)));
        assert!(chunks.contains(&ChunkCoord::new(6, 3)));
        assert_eq!(chunks.len(), 2);
        assert_eq!(culler.wrap_offsets(&camera), vec![(-4000.0, 0.0)]);

        let plan = culler.render_plan(&camera);
        assert!(plan.contains(&ChunkInstance {
            coord: ChunkCoord::new(6, 3),
            offset: (-4000.0, 0.0),
        }));
        assert!(plan.contains(&ChunkInstance {
            coord: ChunkCoord::new(0, 3),
            offset: (0.0, 0.0),
        }));
    }

    #[test]
    fn test_view_across_corner() {
        let culler = reference_culler();
        let camera = CameraRect::new(3990.0, 3990.0, 100.0, 100.0);
        let chunks = culler.visible_chunks(&camera);
        assert_eq!(
            chunks,
            vec![
                ChunkCoord::new(0, 0),
                ChunkCoord::new(0, 6),
                ChunkCoord::new(6, 0),
                ChunkCoord::new(6, 6),
            ]
        );
        let offsets = culler.wrap_offsets(&camera);
        assert_eq!(offsets.len(), 3);
        assert!(offsets.contains(&(4000.0, 0.0)));
        assert!(offsets.contains(&(0.0, 4000.0)));
        assert!(offsets.contains(&(4000.0, 4000.0)));
    }

    #[test]
    fn test_view_larger_than_world() {
        let culler = reference_culler();
        let camera = CameraRect::new(2000.0, 2000.0, 10_000.0, 100.0);
        let chunks = culler.visible_chunks(&camera);
        // Every column, one row
        assert_eq!(chunks.len(), 7);
        assert!(chunks.iter().all(|c| c.y == 3));

        let plan = culler.render_plan(&camera);
        // x runs from -3000 to 7000: copies -1, 0 and 1
        let copies: BTreeSet<i64> = plan.iter().map(|i| (i.offset.0 / 4000.0) as i64).collect();
        assert_eq!(copies, BTreeSet::from([-1, 0, 1]));
    }

    #[test]
    fn test_huge_view_is_bounded() {
        let culler = reference_culler();
        let camera = CameraRect::new(0.0, 0.0, 1.0e12, 1.0e12);
        assert_eq!(culler.visible_chunks(&camera).len(), 49);
        assert!(culler.render_plan(&camera).len() <= 49 * (MAX_WORLD_COPIES as usize).pow(2));
    }

    #[test]
    fn test_invalid_camera() {
        let culler = reference_culler();
        assert!(culler
            .visible_chunks(&CameraRect::new(f64::NAN, 0.0, 10.0, 10.0))
            .is_empty());
        assert!(culler
            .render_plan(&CameraRect::new(0.0, 0.0, -1.0, 10.0))
            .is_empty());
        assert!(culler
            .wrap_offsets(&CameraRect::new(0.0, 0.0, f64::INFINITY, 10.0))
            .is_empty());
    }
}
