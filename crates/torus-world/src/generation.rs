//! Procedural world generation.
//!
//! Every decision is a pure function of the seed and a tile coordinate,
//! derived from a 32-bit string hash over composite keys. Each object
//! category uses its own salted key so categories do not correlate.

use serde::{Deserialize, Serialize};
use torus_common::{ChunkCoord, ConfigError, TileCoord, WorldConfig};

use crate::chunk::{Chunk, ObjectKind, PlacedObject, TerrainKind, Tile};
use crate::geometry::WorldGeometry;

/// Polynomial string accumulator shared by both hashes.
///
/// Runs over UTF-16 code units with signed 32-bit wraparound.
fn accumulate(key: &str) -> i32 {
    key.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(i32::from(unit))
    })
}

/// String hash without mixing. Used for per-tile identity and the spawn point.
#[must_use]
pub fn simple_hash(key: &str) -> u32 {
    accumulate(key).unsigned_abs()
}

/// String hash with a Murmur3-style avalanche finalizer.
#[must_use]
pub fn mixed_hash(key: &str) -> u32 {
    let mut h = accumulate(key) as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    (h as i32).unsigned_abs()
}

/// Probability parameters for one object category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRule {
    /// Category label mixed into the hash key
    pub label: String,
    /// Added to the seed before hashing
    pub salt: u64,
    /// Chance before per-tile variation
    pub base_chance: f64,
    /// Modulus of the variation term
    pub variation_mod: u32,
    /// Divisor of the variation term
    pub variation_div: f64,
    /// Lower clamp of the final chance
    pub min_chance: f64,
    /// Upper clamp of the final chance
    pub max_chance: f64,
}

impl PlacementRule {
    /// Ground cover.
    #[must_use]
    pub fn grass() -> Self {
        Self {
            label: "grass".to_string(),
            salt: 0,
            base_chance: 0.01,
            variation_mod: 200,
            variation_div: 1000.0,
            min_chance: 0.01,
            max_chance: 1.0,
        }
    }

    /// Trees.
    #[must_use]
    pub fn tree() -> Self {
        Self {
            label: "tree".to_string(),
            salt: 10_000,
            base_chance: 0.025,
            variation_mod: 150,
            variation_div: 1000.0,
            min_chance: 0.01,
            max_chance: 0.04,
        }
    }

    /// Rocks.
    #[must_use]
    pub fn rock() -> Self {
        Self {
            label: "rock".to_string(),
            salt: 20_000,
            base_chance: 0.015,
            variation_mod: 100,
            variation_div: 1000.0,
            min_chance: 0.005,
            max_chance: 0.025,
        }
    }

    /// Hash key for a tile under this rule.
    #[must_use]
    pub fn key(&self, seed: u64, tile: TileCoord) -> String {
        format!(
            "{}-{}-{}-{}",
            seed.wrapping_add(self.salt),
            self.label,
            tile.x,
            tile.y
        )
    }

    /// Per-tile chance after variation and clamping.
    #[must_use]
    pub fn chance(&self, hash: u32) -> f64 {
        let modulus = self.variation_mod.max(1);
        let variation =
            (f64::from(hash % modulus) - f64::from(modulus / 2)) / self.variation_div;
        (self.base_chance + variation)
            .min(self.max_chance)
            .max(self.min_chance)
    }

    /// Decides placement for a precomputed hash.
    #[must_use]
    pub fn admits(&self, hash: u32) -> bool {
        f64::from(hash % 1000) / 1000.0 < self.chance(hash)
    }
}

/// Generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// World seed
    pub seed: u64,
    /// Fraction of chunk columns (from x = 0) that are plains
    pub biome_plains_fraction: f64,
    /// Grass rule
    pub grass: PlacementRule,
    /// Tree rule
    pub tree: PlacementRule,
    /// Rock rule
    pub rock: PlacementRule,
}

impl GeneratorConfig {
    /// Builds the default rules for a world configuration.
    #[must_use]
    pub fn from_world(config: &WorldConfig) -> Self {
        Self {
            seed: config.seed,
            biome_plains_fraction: config.biome_plains_fraction,
            ..Default::default()
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: torus_common::DEFAULT_SEED,
            biome_plains_fraction: 0.5,
            grass: PlacementRule::grass(),
            tree: PlacementRule::tree(),
            rock: PlacementRule::rock(),
        }
    }
}

/// Deterministic tile and object generator.
#[derive(Debug, Clone)]
pub struct ProceduralGenerator {
    config: GeneratorConfig,
    geometry: WorldGeometry,
}

impl ProceduralGenerator {
    /// Creates a generator over the given geometry.
    #[must_use]
    pub const fn new(config: GeneratorConfig, geometry: WorldGeometry) -> Self {
        Self { config, geometry }
    }

    /// Creates a generator with default rules for a world configuration.
    pub fn from_world(config: &WorldConfig) -> Result<Self, ConfigError> {
        let geometry = WorldGeometry::new(config)?;
        Ok(Self::new(GeneratorConfig::from_world(config), geometry))
    }

    /// Returns the generator configuration.
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Returns the seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.config.seed
    }

    /// Identity hash of a tile.
    #[must_use]
    pub fn tile_hash(&self, tile: TileCoord) -> u32 {
        simple_hash(&format!("{}-{}-{}", self.config.seed, tile.x, tile.y))
    }

    /// Biome of a chunk column.
    #[must_use]
    pub fn terrain_for_chunk(&self, chunk: ChunkCoord) -> TerrainKind {
        let (chunks_x, _) = self.geometry.chunk_count();
        let plains_columns =
            (f64::from(chunks_x) * self.config.biome_plains_fraction).floor() as i64;
        let column = i64::from(self.geometry.wrap_chunk(chunk).x);
        if column < plains_columns {
            TerrainKind::Plains
        } else {
            TerrainKind::Desert
        }
    }

    /// Generates a single tile.
    #[must_use]
    pub fn generate_tile(&self, tile: TileCoord) -> Tile {
        let terrain = self.terrain_for_chunk(self.geometry.tile_to_chunk(tile));
        Tile {
            x: tile.x,
            y: tile.y,
            hash: self.tile_hash(tile),
            terrain,
        }
    }

    /// Decides whether a rule places its object on a tile.
    #[must_use]
    pub fn should_place(&self, rule: &PlacementRule, tile: TileCoord) -> bool {
        rule.admits(mixed_hash(&rule.key(self.config.seed, tile)))
    }

    /// Objects generated for a tile.
    ///
    /// Grass is independent of the other categories. A tree takes the tile
    /// before a rock is considered, so no tile holds both.
    #[must_use]
    pub fn objects_for_tile(&self, tile: TileCoord) -> Vec<ObjectKind> {
        let mut kinds = Vec::new();
        if self.should_place(&self.config.grass, tile) {
            kinds.push(ObjectKind::Grass);
        }
        if self.should_place(&self.config.tree, tile) {
            kinds.push(ObjectKind::Tree);
        } else if self.should_place(&self.config.rock, tile) {
            kinds.push(ObjectKind::Rock);
        }
        kinds
    }

    /// Spawn tile, kept off the world edge.
    #[must_use]
    pub fn starting_tile(&self) -> TileCoord {
        let hash = u64::from(simple_hash(&self.config.seed.to_string()));
        let (width, height) = self.geometry.grid_size();
        let axis = |value: u64, size: u32| -> i32 {
            if size <= 2 {
                0
            } else {
                (1 + value % u64::from(size - 2)) as i32
            }
        };
        TileCoord::new(axis(hash, width), axis(hash * 2, height))
    }

    /// Spawn point as a pixel centre.
    #[must_use]
    pub fn starting_position(&self) -> (f64, f64) {
        self.geometry.tile_to_pixel_center(self.starting_tile())
    }

    /// Generates the procedural content of a chunk. The coordinate is wrapped first.
    #[must_use]
    pub fn generate_chunk(&self, coord: ChunkCoord) -> Chunk {
        let coord = self.geometry.wrap_chunk(coord);
        let bounds = self.geometry.chunk_tile_bounds(coord);
        let terrain = self.terrain_for_chunk(coord);
        let mut chunk = Chunk::new(
            coord,
            self.geometry.chunk_pixel_origin(coord),
            bounds,
            terrain,
        );

        for tile in bounds.iter() {
            chunk.push_tile(Tile {
                x: tile.x,
                y: tile.y,
                hash: self.tile_hash(tile),
                terrain,
            });
            let center = self.geometry.tile_to_pixel_center(tile);
            for kind in self.objects_for_tile(tile) {
                chunk.push_object(PlacedObject::new(kind, tile, center));
            }
        }

        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_generator() -> ProceduralGenerator {
        ProceduralGenerator::from_world(&WorldConfig::default()).expect("valid config")
    }

    fn tiles_with(chunk: &Chunk, kind: &ObjectKind) -> Vec<(i32, i32)> {
        chunk
            .objects()
            .iter()
            .filter(|o| &o.kind == kind)
            .map(|o| (o.tile.x, o.tile.y))
            .collect()
    }

    #[test]
    fn test_mixed_hash_golden_values() {
        assert_eq!(mixed_hash("42-tree-100-200"), 805_164_642);
        assert_eq!(mixed_hash("10042-tree-100-200"), 153_311_254);
        assert_eq!(mixed_hash("42-grass-0-0"), 717_985_146);
        assert_eq!(mixed_hash("20042-rock-5-5"), 1_560_818_726);
        assert_eq!(mixed_hash("12345-grass--3-7"), 499_069_972);
        assert_eq!(mixed_hash(""), 0);
    }

    #[test]
    fn test_simple_hash_golden_values() {
        assert_eq!(simple_hash("42-0-0"), 1_536_280_068);
        assert_eq!(simple_hash("42-100-200"), 1_267_801_991);
        assert_eq!(simple_hash("42"), 1662);
        assert_eq!(simple_hash("42-3-4"), 1_536_282_955);
        assert_eq!(simple_hash("42--1-0"), 379_956_278);
    }

    #[test]
    fn test_determinism() {
        let a = reference_generator();
        let b = reference_generator();
        let tile = TileCoord::new(100, 200);
        assert_eq!(a.tile_hash(tile), b.tile_hash(tile));
        assert_eq!(a.objects_for_tile(tile), b.objects_for_tile(tile));
        assert_eq!(
            mixed_hash(&a.config().tree.key(42, tile)),
            mixed_hash(&a.config().tree.key(42, tile))
        );
        assert!(!a.should_place(&a.config().tree, tile));
        assert!(!a.should_place(&a.config().grass, TileCoord::new(0, 0)));
    }

    #[test]
    fn test_chunk_placement_golden() {
        let generator = reference_generator();
        let chunk = generator.generate_chunk(ChunkCoord::new(0, 0));
        assert_eq!(chunk.tiles().len(), 256);
        assert_eq!(
            tiles_with(&chunk, &ObjectKind::Tree),
            vec![(12, 0), (9, 2), (14, 7), (0, 10), (7, 13)]
        );
        assert!(tiles_with(&chunk, &ObjectKind::Rock).is_empty());
        assert_eq!(
            tiles_with(&chunk, &ObjectKind::Grass),
            vec![(0, 10), (10, 12), (13, 13)]
        );
        let tree = chunk
            .objects_at(TileCoord::new(12, 0))
            .next()
            .expect("tree at (12, 0)");
        assert_eq!((tree.x, tree.y), (500.0, 20.0));
        assert_eq!(tree.collision_radius, Some(18.0));
    }

    #[test]
    fn test_tree_excludes_rock() {
        let generator = reference_generator();
        for tile in [TileCoord::new(76, 13), TileCoord::new(23, 21)] {
            assert!(generator.should_place(&generator.config().tree, tile));
            assert!(generator.should_place(&generator.config().rock, tile));
            let kinds = generator.objects_for_tile(tile);
            assert!(kinds.contains(&ObjectKind::Tree));
            assert!(!kinds.contains(&ObjectKind::Rock));
        }
    }

    #[test]
    fn test_world_object_counts() {
        let generator = reference_generator();
        let (mut trees, mut rocks, mut grass) = (0, 0, 0);
        for cy in 0..7 {
            for cx in 0..7 {
                let chunk = generator.generate_chunk(ChunkCoord::new(cx, cy));
                for object in chunk.objects() {
                    match object.kind {
                        ObjectKind::Tree => trees += 1,
                        ObjectKind::Rock => rocks += 1,
                        ObjectKind::Grass => grass += 1,
                        _ => {}
                    }
                }
            }
        }
        // Two tiles pass both the tree and rock rolls; only the tree is kept
        assert_eq!((trees, rocks, grass), (244, 63, 109));
    }

    #[test]
    fn test_starting_position() {
        let generator = reference_generator();
        assert_eq!(generator.starting_tile(), TileCoord::new(95, 91));
        assert_eq!(generator.starting_position(), (3820.0, 3660.0));
    }

    #[test]
    fn test_biome_split() {
        let generator = reference_generator();
        // 7 columns at 0.5 => columns 0..3 are plains
        assert_eq!(generator.terrain_for_chunk(ChunkCoord::new(2, 0)), TerrainKind::Plains);
        assert_eq!(generator.terrain_for_chunk(ChunkCoord::new(3, 0)), TerrainKind::Desert);
        assert_eq!(generator.terrain_for_chunk(ChunkCoord::new(-1, 4)), TerrainKind::Desert);
        assert_eq!(
            generator.generate_tile(TileCoord::new(0, 0)).hash,
            simple_hash("42-0-0")
        );
    }

    #[test]
    fn test_chance_clamped() {
        let rule = PlacementRule::tree();
        for hash in [0, 74, 75, 149, 999, u32::MAX] {
            let chance = rule.chance(hash);
            assert!((rule.min_chance..=rule.max_chance).contains(&chance));
        }
    }
}
