//! Destinations for converted chunks.

use crate::batch::WriteBatch;
use crate::error::StoreError;
use crate::position::ChunkPosition;
use crate::tag::{write_nbt, Flavor};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Name of the file listing every chunk written by a `FolderChunkStore`.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Receives converted chunks from any worker thread and persists them on
/// flush.
pub trait ChunkStore: Send + Sync {
    fn save(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Persists everything saved so far.
    fn flush(&self) -> Result<FlushReport, StoreError>;
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Chunks persisted by this flush.
    pub chunks: usize,
    /// How many of them were placeholders.
    pub placeholders: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps batches in memory.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    batches: Mutex<BTreeMap<ChunkPosition, WriteBatch>>,
    flushes: AtomicUsize,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        MemoryChunkStore::default()
    }

    pub fn batch(&self, position: ChunkPosition) -> Option<WriteBatch> {
        lock(&self.batches).get(&position).cloned()
    }

    pub fn positions(&self) -> Vec<ChunkPosition> {
        lock(&self.batches).keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.batches).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.batches).is_empty()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl ChunkStore for MemoryChunkStore {
    fn save(&self, batch: WriteBatch) -> Result<(), StoreError> {
        lock(&self.batches).insert(batch.position(), batch);

        Ok(())
    }

    fn flush(&self) -> Result<FlushReport, StoreError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        let batches = lock(&self.batches);

        Ok(FlushReport {
            chunks: batches.len(),
            placeholders: batches.values().filter(|b| b.is_placeholder()).count(),
        })
    }
}

/// Chunk encoded at save time, written on flush.
struct PendingChunk {
    bytes: Vec<u8>,
    written: usize,
    placeholder: bool,
}

#[derive(Serialize)]
struct Manifest<'a> {
    chunks: Vec<ManifestEntry<'a>>,
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    x: i32,
    z: i32,
    file: &'a str,
    written: usize,
    placeholder: bool,
}

/// Writes one gzip compressed tag file per chunk, `c.<x>.<z>.dat`, and a
/// manifest into a folder.
pub struct FolderChunkStore {
    folder_path: PathBuf,
    pending: Mutex<BTreeMap<ChunkPosition, PendingChunk>>,
}

impl FolderChunkStore {
    /// The folder is created on the first flush.
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        FolderChunkStore {
            folder_path: folder.as_ref().to_path_buf(),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn folder_path(&self) -> &Path {
        &self.folder_path
    }
}

pub fn chunk_filename(position: ChunkPosition) -> String {
    format!("c.{}.{}.dat", position.x, position.z)
}

impl ChunkStore for FolderChunkStore {
    fn save(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut bytes = Vec::new();
        write_nbt(&mut bytes, Some(""), &batch.to_tag(), Flavor::GzCompressed)?;

        let chunk = PendingChunk {
            bytes,
            written: batch.written(),
            placeholder: batch.is_placeholder(),
        };

        lock(&self.pending).insert(batch.position(), chunk);

        Ok(())
    }

    fn flush(&self) -> Result<FlushReport, StoreError> {
        let pending = lock(&self.pending);
        fs::create_dir_all(&self.folder_path)?;

        let mut report = FlushReport::default();
        let names: Vec<_> = pending.keys().map(|&p| chunk_filename(p)).collect();
        let mut manifest = Manifest {
            chunks: Vec::with_capacity(pending.len()),
        };

        for ((position, chunk), name) in pending.iter().zip(&names) {
            debug!(target: "anvil-convert", "Writing chunk {} to {}", position, name);
            fs::write(self.folder_path.join(name), &chunk.bytes)?;

            report.chunks += 1;
            if chunk.placeholder {
                report.placeholders += 1;
            }

            manifest.chunks.push(ManifestEntry {
                x: position.x,
                z: position.z,
                file: name,
                written: chunk.written,
                placeholder: chunk.placeholder,
            });
        }

        let mut writer = BufWriter::new(File::create(self.folder_path.join(MANIFEST_FILE_NAME))?);
        serde_json::to_writer_pretty(&mut writer, &manifest)?;
        writer.flush()?;

        info!(
            target: "anvil-convert",
            "Wrote {} chunks to {}",
            report.chunks,
            self.folder_path.display()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::Biome;
    use crate::registry::BlockStateId;
    use crate::tag::{read_nbt, CompoundTagExt};
    use tempfile::TempDir;

    fn batch(x: i32, z: i32) -> WriteBatch {
        let mut batch = WriteBatch::new(ChunkPosition::new(x, z), Biome::VOID);
        batch.set_block(0, 64, 0, BlockStateId(1));
        batch
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryChunkStore::new();
        store.save(batch(0, 0)).unwrap();
        store
            .save(WriteBatch::placeholder(ChunkPosition::new(1, 0), Biome::VOID))
            .unwrap();

        let report = store.flush().unwrap();

        assert_eq!(report, FlushReport { chunks: 2, placeholders: 1 });
        assert_eq!(store.flushes(), 1);
        assert_eq!(
            store.batch(ChunkPosition::new(0, 0)).unwrap().block(0, 64, 0),
            Some(BlockStateId(1))
        );
    }

    #[test]
    fn test_folder_store_writes_on_flush() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("chunks");
        let store = FolderChunkStore::new(&output);

        store.save(batch(-1, 2)).unwrap();
        store.save(batch(3, 4)).unwrap();
        assert!(!output.exists());

        let report = store.flush().unwrap();
        assert_eq!(report.chunks, 2);

        let mut file = File::open(output.join("c.-1.2.dat")).unwrap();
        let (tag, _) = read_nbt(&mut file, Flavor::GzCompressed).unwrap();
        assert_eq!(tag.get_i32("xPos"), Some(-1));
        assert_eq!(tag.get_i32("zPos"), Some(2));
        assert!(output.join("c.3.4.dat").is_file());

        let manifest: serde_json::Value =
            serde_json::from_slice(&fs::read(output.join(MANIFEST_FILE_NAME)).unwrap()).unwrap();
        let chunks = manifest["chunks"].as_array().unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0]["file"], "c.-1.2.dat");
        assert_eq!(chunks[0]["written"], 1);
        assert_eq!(chunks[1]["placeholder"], false);
    }
}
