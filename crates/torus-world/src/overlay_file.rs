//! File-backed overlay store.
//!
//! One file per `(world, chunk)`: a little-endian `u32` header length, a
//! bincode [`OverlayHeader`], then the bincode record map compressed with
//! LZ4 (size-prepended). Each world directory also holds a `world.toml`
//! record of the configuration the world was created with. Writes go
//! through a temp file and a rename.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use torus_common::{ChunkCoord, OverlayError, OverlayResult, SchemaVersion, WorldId, OVERLAY_MAGIC};
use tracing::{debug, info};

use crate::overlay::{
    remove_kind, sort_newest_first, CellAddress, ChunkOverrides, OverlayStats, OverlayStore,
    PlacedEntity, WorldRecord,
};

const FILE_EXTENSION: &str = "tovl";

const WORLD_RECORD_FILE: &str = "world.toml";

/// Header written in front of every overlay file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayHeader {
    /// Magic bytes for format identification
    pub magic: [u8; 4],
    /// Schema version
    pub version: SchemaVersion,
    /// Owning world
    pub world: u64,
    /// Chunk X coordinate
    pub x: i32,
    /// Chunk Y coordinate
    pub y: i32,
    /// Number of cell records in the body
    pub cell_count: u32,
}

impl OverlayHeader {
    /// Creates a header for a chunk's records.
    #[must_use]
    pub fn new(world: WorldId, chunk: ChunkCoord, cell_count: usize) -> Self {
        Self {
            magic: OVERLAY_MAGIC,
            version: SchemaVersion::OVERLAY,
            world: world.raw(),
            x: chunk.x,
            y: chunk.y,
            cell_count: u32::try_from(cell_count).unwrap_or(u32::MAX),
        }
    }

    /// Validates the header.
    pub fn validate(&self) -> OverlayResult<()> {
        if self.magic != OVERLAY_MAGIC {
            return Err(OverlayError::InvalidFormat);
        }
        if !SchemaVersion::OVERLAY.reads(self.version) {
            return Err(OverlayError::VersionMismatch {
                expected: SchemaVersion::OVERLAY.to_string(),
                actual: self.version.to_string(),
            });
        }
        Ok(())
    }
}

/// Encodes one chunk's records.
pub fn encode_overrides(
    world: WorldId,
    chunk: ChunkCoord,
    overrides: &ChunkOverrides,
) -> OverlayResult<Vec<u8>> {
    let header = OverlayHeader::new(world, chunk, overrides.len());
    let header_bytes =
        bincode::serialize(&header).map_err(|e| OverlayError::Serialization(e.to_string()))?;
    let body =
        bincode::serialize(overrides).map_err(|e| OverlayError::Serialization(e.to_string()))?;
    let compressed = lz4_flex::compress_prepend_size(&body);

    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| OverlayError::Serialization("header too large".into()))?;
    let mut result = Vec::with_capacity(4 + header_bytes.len() + compressed.len());
    result.extend_from_slice(&header_len.to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&compressed);
    Ok(result)
}

/// Decodes a file produced by [`encode_overrides`].
pub fn decode_overrides(bytes: &[u8]) -> OverlayResult<(OverlayHeader, ChunkOverrides)> {
    if bytes.len() < 4 {
        return Err(OverlayError::Deserialization("data too short".into()));
    }
    let header_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let rest = &bytes[4..];
    if rest.len() < header_len {
        return Err(OverlayError::Deserialization(
            "header length mismatch".into(),
        ));
    }
    let (header_bytes, compressed) = rest.split_at(header_len);

    let header: OverlayHeader = bincode::deserialize(header_bytes)
        .map_err(|e| OverlayError::Deserialization(e.to_string()))?;
    header.validate()?;

    let body = lz4_flex::decompress_size_prepended(compressed)
        .map_err(|e| OverlayError::Deserialization(e.to_string()))?;
    let overrides: ChunkOverrides =
        bincode::deserialize(&body).map_err(|e| OverlayError::Deserialization(e.to_string()))?;
    if overrides.len() != header.cell_count as usize {
        return Err(OverlayError::Deserialization(
            "cell count mismatch".into(),
        ));
    }
    Ok((header, overrides))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> OverlayResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Overlay store persisting each chunk's records to its own file.
pub struct FileOverlayStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl FileOverlayStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> OverlayResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Overlay store at {}", root.display());
        Ok(Self {
            root,
            lock: RwLock::new(()),
        })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything persisted for a world.
    #[must_use]
    pub fn world_dir(&self, world: WorldId) -> PathBuf {
        self.root.join(format!("world_{world}"))
    }

    /// Path of a chunk's overlay file.
    #[must_use]
    pub fn chunk_path(&self, world: WorldId, chunk: ChunkCoord) -> PathBuf {
        self.world_dir(world)
            .join(format!("overlay_{}_{}.{FILE_EXTENSION}", chunk.x, chunk.y))
    }

    /// Path of a world's record.
    #[must_use]
    pub fn world_record_path(&self, world: WorldId) -> PathBuf {
        self.world_dir(world).join(WORLD_RECORD_FILE)
    }

    fn read_world_record(path: &Path) -> OverlayResult<Option<WorldRecord>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: WorldRecord =
            toml::from_str(&contents).map_err(|e| OverlayError::Deserialization(e.to_string()))?;
        if !SchemaVersion::WORLD_RECORD.reads(record.version) {
            return Err(OverlayError::VersionMismatch {
                expected: SchemaVersion::WORLD_RECORD.to_string(),
                actual: record.version.to_string(),
            });
        }
        Ok(Some(record))
    }

    fn load(&self, world: WorldId, chunk: ChunkCoord) -> OverlayResult<ChunkOverrides> {
        let path = self.chunk_path(world, chunk);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ChunkOverrides::new())
            },
            Err(e) => return Err(e.into()),
        };
        let (header, overrides) = decode_overrides(&bytes)?;
        if header.world != world.raw() || header.x != chunk.x || header.y != chunk.y {
            return Err(OverlayError::InvalidFormat);
        }
        Ok(overrides)
    }

    fn store(
        &self,
        world: WorldId,
        chunk: ChunkCoord,
        overrides: &ChunkOverrides,
    ) -> OverlayResult<()> {
        let path = self.chunk_path(world, chunk);
        if overrides.is_empty() {
            match fs::remove_file(&path) {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = encode_overrides(world, chunk, overrides)?;
        write_atomic(&path, &bytes)?;
        debug!(
            "Wrote {} overlay records for chunk {} to {}",
            overrides.len(),
            chunk,
            path.display()
        );
        Ok(())
    }

    /// Read-modify-write of one chunk under the write lock.
    fn update<T>(
        &self,
        world: WorldId,
        chunk: ChunkCoord,
        f: impl FnOnce(&mut ChunkOverrides) -> T,
    ) -> OverlayResult<T> {
        let _guard = self.lock.write();
        let mut overrides = self.load(world, chunk)?;
        let result = f(&mut overrides);
        self.store(world, chunk, &overrides)?;
        Ok(result)
    }

    fn overlay_files(&self) -> OverlayResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for world_dir in fs::read_dir(&self.root)? {
            let world_dir = world_dir?.path();
            if !world_dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&world_dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == FILE_EXTENSION) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }
}

impl OverlayStore for FileOverlayStore {
    fn chunk_overrides(&self, world: WorldId, chunk: ChunkCoord) -> OverlayResult<ChunkOverrides> {
        let _guard = self.lock.read();
        self.load(world, chunk)
    }

    fn set_cell_override(
        &self,
        addr: &CellAddress,
        entities: Vec<PlacedEntity>,
    ) -> OverlayResult<()> {
        self.update(addr.world, addr.chunk, |cells| {
            cells.insert(addr.cell, entities);
        })
    }

    fn clear_cell_override(&self, addr: &CellAddress) -> OverlayResult<bool> {
        self.update(addr.world, addr.chunk, |cells| {
            cells.remove(&addr.cell).is_some()
        })
    }

    fn add_entity(&self, addr: &CellAddress, entity: PlacedEntity) -> OverlayResult<()> {
        self.update(addr.world, addr.chunk, |cells| {
            cells.entry(addr.cell).or_default().push(entity);
        })
    }

    fn remove_entity(&self, addr: &CellAddress, kind: &str) -> OverlayResult<bool> {
        self.update(addr.world, addr.chunk, |cells| {
            cells
                .get_mut(&addr.cell)
                .is_some_and(|entities| remove_kind(entities, kind))
        })
    }

    fn stats(&self) -> OverlayResult<OverlayStats> {
        let _guard = self.lock.read();
        let mut stats = OverlayStats::default();
        for path in self.overlay_files()? {
            let (_, overrides) = decode_overrides(&fs::read(&path)?)?;
            stats.add_chunk(&overrides);
        }
        Ok(stats)
    }

    fn world_record(&self, world: WorldId) -> OverlayResult<Option<WorldRecord>> {
        let _guard = self.lock.read();
        let record = Self::read_world_record(&self.world_record_path(world))?;
        match record {
            Some(record) if record.id != world => Err(OverlayError::InvalidFormat),
            record => Ok(record),
        }
    }

    fn save_world_record(&self, record: &WorldRecord) -> OverlayResult<()> {
        let _guard = self.lock.write();
        let path = self.world_record_path(record.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(record)
            .map_err(|e| OverlayError::Serialization(e.to_string()))?;
        write_atomic(&path, contents.as_bytes())?;
        debug!("Saved record of world {} to {}", record.id, path.display());
        Ok(())
    }

    fn worlds(&self) -> OverlayResult<Vec<WorldRecord>> {
        let _guard = self.lock.read();
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let dir = entry?.path();
            if dir.is_dir() {
                if let Some(record) = Self::read_world_record(&dir.join(WORLD_RECORD_FILE))? {
                    records.push(record);
                }
            }
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    fn delete_world(&self, world: WorldId) -> OverlayResult<bool> {
        let _guard = self.lock.write();
        let dir = self.world_dir(world);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Deleted world {} at {}", world, dir.display());
                Ok(true)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
