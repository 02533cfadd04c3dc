//! Persistent per-cell modifications layered over procedural output.
//!
//! An overlay record for a cell supersedes everything the generator would
//! put there. A record holding an empty list means "nothing here" and is
//! distinct from having no record at all.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use torus_common::{CellCoord, ChunkCoord, OverlayResult, SchemaVersion, WorldConfig, WorldId};
use tracing::debug;

/// Primary key of an overlay record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    /// Owning world
    pub world: WorldId,
    /// Owning chunk
    pub chunk: ChunkCoord,
    /// Tile offset within the chunk
    pub cell: CellCoord,
}

impl CellAddress {
    /// Creates a new address.
    #[must_use]
    pub const fn new(world: WorldId, chunk: ChunkCoord, cell: CellCoord) -> Self {
        Self { world, chunk, cell }
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "world {} chunk {} cell ({}, {})",
            self.world, self.chunk, self.cell.x, self.cell.y
        )
    }
}

/// An entity occupying a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedEntity {
    /// Kind name, e.g. `"tree"`
    pub kind: String,
    /// Opaque key-value data
    pub metadata: BTreeMap<String, String>,
}

impl PlacedEntity {
    /// Creates an entity with no metadata.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A persisted world: its identity and the configuration its overlay
/// records were written against.
///
/// Cell addresses only mean something under the layout that produced them,
/// so a world must be reopened with the same configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRecord {
    /// World identifier
    pub id: WorldId,
    /// Creation time in seconds since the Unix epoch
    pub created_at: u64,
    /// Record format
    pub version: SchemaVersion,
    /// Layout and seed
    pub config: WorldConfig,
}

impl WorldRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(id: WorldId, config: WorldConfig) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            id,
            created_at,
            version: SchemaVersion::WORLD_RECORD,
            config,
        }
    }
}

/// Orders world records newest first, ties by id.
pub(crate) fn sort_newest_first(records: &mut [WorldRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

/// Overlay records of one chunk, keyed by cell.
pub type ChunkOverrides = BTreeMap<CellCoord, Vec<PlacedEntity>>;

/// Aggregate overlay statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayStats {
    /// Cells carrying a record
    pub modified_cells: usize,
    /// Chunks with at least one record
    pub chunks_with_modifications: usize,
    /// Entities across all records
    pub total_entities: usize,
}

impl OverlayStats {
    /// Folds one chunk's records into the totals.
    pub fn add_chunk(&mut self, overrides: &ChunkOverrides) {
        if overrides.is_empty() {
            return;
        }
        self.chunks_with_modifications += 1;
        self.modified_cells += overrides.len();
        self.total_entities += overrides.values().map(Vec::len).sum::<usize>();
    }
}

impl std::fmt::Display for OverlayStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} modified cells in {} chunks, {} entities",
            self.modified_cells, self.chunks_with_modifications, self.total_entities
        )
    }
}

/// Durable store of overlay records.
///
/// Each mutation is atomic with respect to reads of the same chunk.
pub trait OverlayStore: Send + Sync {
    /// All records for a chunk.
    fn chunk_overrides(&self, world: WorldId, chunk: ChunkCoord) -> OverlayResult<ChunkOverrides>;

    /// The record for one cell, if any.
    fn cell_override(&self, addr: &CellAddress) -> OverlayResult<Option<Vec<PlacedEntity>>> {
        Ok(self
            .chunk_overrides(addr.world, addr.chunk)?
            .remove(&addr.cell))
    }

    /// Replaces the record for a cell. An empty list records a cleared cell.
    fn set_cell_override(&self, addr: &CellAddress, entities: Vec<PlacedEntity>)
        -> OverlayResult<()>;

    /// Deletes the record for a cell so it reverts to procedural output.
    /// Returns whether a record existed.
    fn clear_cell_override(&self, addr: &CellAddress) -> OverlayResult<bool>;

    /// Appends an entity to a cell's record, creating the record if needed.
    fn add_entity(&self, addr: &CellAddress, entity: PlacedEntity) -> OverlayResult<()>;

    /// Removes every entity of `kind` from a cell's record. The record is
    /// kept even if it becomes empty. Returns whether anything was removed.
    fn remove_entity(&self, addr: &CellAddress, kind: &str) -> OverlayResult<bool>;

    /// Totals across every world in the store.
    fn stats(&self) -> OverlayResult<OverlayStats>;

    /// The stored record of a world, if it was ever created.
    fn world_record(&self, world: WorldId) -> OverlayResult<Option<WorldRecord>>;

    /// Creates or replaces a world's record.
    fn save_world_record(&self, record: &WorldRecord) -> OverlayResult<()>;

    /// Every stored world, newest first.
    fn worlds(&self) -> OverlayResult<Vec<WorldRecord>>;

    /// Deletes a world's record together with all of its overlay records.
    /// Returns whether anything existed.
    fn delete_world(&self, world: WorldId) -> OverlayResult<bool>;
}

/// Removes all entities of a kind. Returns whether anything was removed.
pub(crate) fn remove_kind(entities: &mut Vec<PlacedEntity>, kind: &str) -> bool {
    let before = entities.len();
    entities.retain(|e| e.kind != kind);
    entities.len() != before
}

/// In-memory overlay store.
#[derive(Debug, Default)]
pub struct MemoryOverlayStore {
    chunks: RwLock<HashMap<(WorldId, ChunkCoord), ChunkOverrides>>,
    worlds: RwLock<BTreeMap<WorldId, WorldRecord>>,
}

impl MemoryOverlayStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverlayStore for MemoryOverlayStore {
    fn chunk_overrides(&self, world: WorldId, chunk: ChunkCoord) -> OverlayResult<ChunkOverrides> {
        Ok(self
            .chunks
            .read()
            .get(&(world, chunk))
            .cloned()
            .unwrap_or_default())
    }

    fn cell_override(&self, addr: &CellAddress) -> OverlayResult<Option<Vec<PlacedEntity>>> {
        Ok(self
            .chunks
            .read()
            .get(&(addr.world, addr.chunk))
            .and_then(|cells| cells.get(&addr.cell))
            .cloned())
    }

    fn set_cell_override(
        &self,
        addr: &CellAddress,
        entities: Vec<PlacedEntity>,
    ) -> OverlayResult<()> {
        debug!("Set override at {} ({} entities)", addr, entities.len());
        self.chunks
            .write()
            .entry((addr.world, addr.chunk))
            .or_default()
            .insert(addr.cell, entities);
        Ok(())
    }

    fn clear_cell_override(&self, addr: &CellAddress) -> OverlayResult<bool> {
        let mut chunks = self.chunks.write();
        let key = (addr.world, addr.chunk);
        let Some(cells) = chunks.get_mut(&key) else {
            return Ok(false);
        };
        let existed = cells.remove(&addr.cell).is_some();
        if cells.is_empty() {
            chunks.remove(&key);
        }
        debug!("Cleared override at {}", addr);
        Ok(existed)
    }

    fn add_entity(&self, addr: &CellAddress, entity: PlacedEntity) -> OverlayResult<()> {
        self.chunks
            .write()
            .entry((addr.world, addr.chunk))
            .or_default()
            .entry(addr.cell)
            .or_default()
            .push(entity);
        Ok(())
    }

    fn remove_entity(&self, addr: &CellAddress, kind: &str) -> OverlayResult<bool> {
        let mut chunks = self.chunks.write();
        Ok(chunks
            .get_mut(&(addr.world, addr.chunk))
            .and_then(|cells| cells.get_mut(&addr.cell))
            .is_some_and(|entities| remove_kind(entities, kind)))
    }

    fn stats(&self) -> OverlayResult<OverlayStats> {
        let mut stats = OverlayStats::default();
        for overrides in self.chunks.read().values() {
            stats.add_chunk(overrides);
        }
        Ok(stats)
    }

    fn world_record(&self, world: WorldId) -> OverlayResult<Option<WorldRecord>> {
        Ok(self.worlds.read().get(&world).cloned())
    }

    fn save_world_record(&self, record: &WorldRecord) -> OverlayResult<()> {
        self.worlds.write().insert(record.id, record.clone());
        Ok(())
    }

    fn worlds(&self) -> OverlayResult<Vec<WorldRecord>> {
        let mut records: Vec<_> = self.worlds.read().values().cloned().collect();
        sort_newest_first(&mut records);
        Ok(records)
    }

    fn delete_world(&self, world: WorldId) -> OverlayResult<bool> {
        let had_record = self.worlds.write().remove(&world).is_some();
        let mut chunks = self.chunks.write();
        let before = chunks.len();
        chunks.retain(|(owner, _), _| *owner != world);
        let had_chunks = chunks.len() != before;
        debug!("Deleted world {world}");
        Ok(had_record || had_chunks)
    }
}
