//! Conversion of one decoded column into a `WriteBatch`.

use crate::batch::{WriteBatch, BIOME_CELLS, CHUNK_VOLUME};
use crate::biome::BiomeTable;
use crate::column::{block_state_key, ColumnView, SECTION_SIDE};
use crate::position::ChunkPosition;
use crate::provider::RegionSet;
use crate::registry::{BlockRegistry, BlockStateId};
use crate::tag::{CompoundTag, NumericArray};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Sections stacked in a 256 blocks high column.
const COLUMN_SECTIONS: i8 = 16;

/// Length of the flat biome arrays written before 1.15: one id per block
/// column, indexed `z * 16 + x`.
const FLAT_BIOME_LENGTH: usize = 256;

/// Source index in `ids` of biome cell `cell`. Flat arrays are sampled at the
/// lowest block column of the cell and repeated over every layer.
fn biome_source_index(cell: usize, ids_length: usize) -> usize {
    if ids_length == FLAT_BIOME_LENGTH {
        let x = (cell & 3) * 4;
        let z = ((cell >> 2) & 3) * 4;
        z * 16 + x
    } else {
        cell
    }
}

/// Secondary generation pass over a converted batch.
pub trait Populator: Send + Sync {
    fn populate(&self, batch: &mut WriteBatch);
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ConversionStats {
    /// Voxels resolved and written.
    pub written: usize,
    /// Voxels without a block state in the column.
    pub unset: usize,
    /// Voxels with a block state that could not be resolved.
    pub skipped: usize,
    /// Biome cells left at the fallback.
    pub biome_fallbacks: usize,
}

#[derive(Debug)]
pub struct Conversion {
    pub batch: WriteBatch,
    pub stats: ConversionStats,
}

/// Skipped voxels sharing one reason.
struct Miss {
    first: (usize, usize, usize),
    count: usize,
}

/// Converts chunks out of an already loaded region set.
///
/// Holds no mutable state; one converter is shared by every worker.
pub struct ChunkConverter {
    regions: Arc<RegionSet>,
    registry: Arc<BlockRegistry>,
    biomes: Arc<BiomeTable>,
}

impl ChunkConverter {
    pub fn new(
        regions: Arc<RegionSet>,
        registry: Arc<BlockRegistry>,
        biomes: Arc<BiomeTable>,
    ) -> Self {
        ChunkConverter {
            regions,
            registry,
            biomes,
        }
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    /// No secondary passes are run on converted chunks.
    pub fn populators(&self) -> Vec<Box<dyn Populator>> {
        Vec::new()
    }

    /// Converts the chunk at `position`. A chunk whose region or column is
    /// missing yields a placeholder batch.
    pub fn convert(&self, position: ChunkPosition) -> Conversion {
        let fallback = self.biomes.fallback();

        let root = match self.regions.column(position) {
            Some(root) => root,
            None => {
                debug!(target: "anvil-convert", "Nothing to convert at chunk {}", position);

                return Conversion {
                    batch: WriteBatch::placeholder(position, fallback),
                    stats: ConversionStats {
                        unset: CHUNK_VOLUME,
                        biome_fallbacks: BIOME_CELLS,
                        ..ConversionStats::default()
                    },
                };
            }
        };

        info!(target: "anvil-convert", "Converting chunk {}", position);

        let view = ColumnView::new(root);
        let mut batch = WriteBatch::new(position, fallback);
        let mut stats = ConversionStats::default();

        self.convert_blocks(position, &view, &mut batch, &mut stats);
        stats.biome_fallbacks = self.convert_biomes(position, &view, &mut batch);
        stats.unset = CHUNK_VOLUME - stats.written - stats.skipped;

        Conversion { batch, stats }
    }

    fn convert_blocks(
        &self,
        position: ChunkPosition,
        view: &ColumnView<'_>,
        batch: &mut WriteBatch,
        stats: &mut ConversionStats,
    ) {
        let mut misses: BTreeMap<String, Miss> = BTreeMap::new();

        for section in view.sections() {
            if section.y() < 0 || section.y() >= COLUMN_SECTIONS {
                continue;
            }

            let base_y = section.y() as usize * SECTION_SIDE;
            let resolved: Vec<_> = section
                .palette()
                .iter()
                .map(|tag| self.resolve_block_state(tag))
                .collect();
            let mut section_misses: BTreeMap<usize, Miss> = BTreeMap::new();

            for (index, &palette_index) in section.indices().iter().enumerate() {
                let x = index % SECTION_SIDE;
                let z = (index / SECTION_SIDE) % SECTION_SIDE;
                let y = base_y + index / (SECTION_SIDE * SECTION_SIDE);

                match resolved.get(palette_index as usize) {
                    Some(Ok(id)) => {
                        batch.set_block(x, y, z, *id);
                        stats.written += 1;
                    }
                    _ => {
                        stats.skipped += 1;
                        section_misses
                            .entry(palette_index as usize)
                            .or_insert(Miss {
                                first: (x, y, z),
                                count: 0,
                            })
                            .count += 1;
                    }
                }
            }

            for (palette_index, miss) in section_misses {
                let reason = match resolved.get(palette_index) {
                    Some(Err(reason)) => reason.clone(),
                    _ => format!(
                        "Palette index {} past palette of {} entries",
                        palette_index,
                        resolved.len()
                    ),
                };

                let entry = misses.entry(reason).or_insert(Miss {
                    first: miss.first,
                    count: 0,
                });
                entry.count += miss.count;
            }
        }

        for (reason, miss) in misses {
            warn!(
                target: "anvil-convert",
                "Chunk {}: skipped {} voxels, first at {:?}: {}",
                position,
                miss.count,
                miss.first,
                reason
            );
        }
    }

    fn resolve_block_state(&self, tag: &CompoundTag) -> Result<BlockStateId, String> {
        let key = block_state_key(tag).map_err(|e| e.to_string())?;

        self.registry.resolve_key(&key).map_err(|e| e.to_string())
    }

    /// Returns the amount of cells left at the fallback.
    fn convert_biomes(
        &self,
        position: ChunkPosition,
        view: &ColumnView<'_>,
        batch: &mut WriteBatch,
    ) -> usize {
        let mut cells = vec![self.biomes.fallback(); BIOME_CELLS];
        let mut fallbacks = BIOME_CELLS;

        if let Some(ids) = view.biomes() {
            // Byte arrays hold unsigned ids.
            let unsigned = matches!(ids, NumericArray::Byte(_));
            let mut unknown = BTreeMap::new();

            for (index, cell) in cells.iter_mut().enumerate() {
                let id = match ids.get(biome_source_index(index, ids.len())) {
                    Some(id) => id,
                    None => continue,
                };
                let id = if unsigned { id & 0xFF } else { id };

                match self.biomes.lookup(id as i32) {
                    Some(biome) => {
                        *cell = biome;
                        fallbacks -= 1;
                    }
                    None => *unknown.entry(id).or_insert(0usize) += 1,
                }
            }

            for (id, count) in unknown {
                warn!(
                    target: "anvil-convert",
                    "Chunk {}: unknown biome {} in {} cells", position, id, count
                );
            }

            if ids.len() < BIOME_CELLS && ids.len() != FLAT_BIOME_LENGTH {
                debug!(
                    target: "anvil-convert",
                    "Chunk {}: biome array holds {} of {} cells", position, ids.len(), BIOME_CELLS
                );
            }
        }

        batch.fill_biomes(&cells);
        fallbacks
    }
}
