use crate::biome::Biome;
use crate::position::ChunkPosition;
use crate::registry::BlockStateId;
use crate::tag::{CompoundTag, ListTag, TagNode};
use bitvec::prelude::*;

pub const CHUNK_SIZE_X: usize = 16;
pub const CHUNK_SIZE_Y: usize = 256;
pub const CHUNK_SIZE_Z: usize = 16;

pub const CHUNK_VOLUME: usize = CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z;

/// 4x4x4 voxel cells: 4 * 4 horizontally times 64 vertically, indexed
/// `(y * 4 + z) * 4 + x` in cell coordinates.
pub const BIOME_CELLS: usize = 1024;

/// Value stored in the encoded form for voxels that were never written.
const UNSET_STATE: i32 = -1;

/// Voxel and biome writes for one chunk, collected before they are handed to a
/// store.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    position: ChunkPosition,
    blocks: Vec<BlockStateId>,
    written: BitVec,
    biomes: Vec<Biome>,
    placeholder: bool,
}

impl WriteBatch {
    /// Empty batch with every biome cell set to `fallback`.
    pub fn new(position: ChunkPosition, fallback: Biome) -> Self {
        WriteBatch {
            position,
            blocks: vec![BlockStateId(0); CHUNK_VOLUME],
            written: bitvec![0; CHUNK_VOLUME],
            biomes: vec![fallback; BIOME_CELLS],
            placeholder: false,
        }
    }

    /// Batch for a chunk with nothing to convert.
    pub fn placeholder(position: ChunkPosition, fallback: Biome) -> Self {
        WriteBatch {
            placeholder: true,
            ..WriteBatch::new(position, fallback)
        }
    }

    pub fn position(&self) -> ChunkPosition {
        self.position
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Sets the state of the voxel at chunk local coordinates.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, id: BlockStateId) {
        let index = voxel_index(x, y, z);

        self.blocks[index] = id;
        self.written.set(index, true);
    }

    /// `None` for voxels which were never written.
    pub fn block(&self, x: usize, y: usize, z: usize) -> Option<BlockStateId> {
        let index = voxel_index(x, y, z);

        if self.written[index] {
            Some(self.blocks[index])
        } else {
            None
        }
    }

    /// Amount of written voxels.
    pub fn written(&self) -> usize {
        self.written.count_ones()
    }

    /// Written voxels as `((x, y, z), id)`, ordered by `y`, then `z`, then `x`.
    pub fn iter_blocks(&self) -> impl Iterator<Item = ((usize, usize, usize), BlockStateId)> + '_ {
        self.written.iter_ones().map(move |index| {
            let x = index % CHUNK_SIZE_X;
            let z = (index / CHUNK_SIZE_X) % CHUNK_SIZE_Z;
            let y = index / (CHUNK_SIZE_X * CHUNK_SIZE_Z);

            ((x, y, z), self.blocks[index])
        })
    }

    /// Replaces biome cells from the start; cells past the end of `biomes` keep
    /// their value.
    pub fn fill_biomes(&mut self, biomes: &[Biome]) {
        let length = biomes.len().min(BIOME_CELLS);

        self.biomes[..length].copy_from_slice(&biomes[..length]);
    }

    pub fn biomes(&self) -> &[Biome] {
        &self.biomes
    }

    /// Engine-agnostic tag form: position, one int array of states per
    /// non-empty section (`-1` for unset voxels) and biome ids.
    pub fn to_tag(&self) -> CompoundTag {
        let section_volume = CHUNK_SIZE_X * CHUNK_SIZE_Z * 16;
        let mut sections = Vec::new();

        for (y, states) in self.blocks.chunks(section_volume).enumerate() {
            let written = &self.written[y * section_volume..(y + 1) * section_volume];

            if written.not_any() {
                continue;
            }

            let states: Vec<i32> = states
                .iter()
                .zip(written.iter().by_vals())
                .map(|(id, is_written)| if is_written { id.0 as i32 } else { UNSET_STATE })
                .collect();

            let mut section = CompoundTag::new();
            section.insert("Y", TagNode::Byte(y as i8));
            section.insert("States", TagNode::IntArray(states));
            sections.push(TagNode::Compound(section));
        }

        let mut tag = CompoundTag::new();
        tag.insert("xPos", TagNode::Int(self.position.x));
        tag.insert("zPos", TagNode::Int(self.position.z));
        tag.insert("Placeholder", TagNode::Byte(self.placeholder as i8));
        tag.insert("Sections", TagNode::List(ListTag::from(sections)));
        tag.insert(
            "Biomes",
            TagNode::IntArray(self.biomes.iter().map(|biome| biome.id).collect()),
        );

        tag
    }
}

fn voxel_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < CHUNK_SIZE_X && y < CHUNK_SIZE_Y && z < CHUNK_SIZE_Z);

    (y * CHUNK_SIZE_Z + z) * CHUNK_SIZE_X + x
}
