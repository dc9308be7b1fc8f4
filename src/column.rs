//! Reader for the column schema used by 1.13 - 1.17 worlds.
//!
//! ```text
//! root
//! ├── DataVersion: int
//! └── Level
//!     ├── xPos, zPos: int
//!     ├── Biomes: int array (or byte array)
//!     └── Sections: list
//!         └── { Y: byte, Palette: [{ Name, Properties }], BlockStates: long array }
//! ```

use crate::error::{BlockStateError, SectionReadError};
use crate::position::ChunkPosition;
use crate::registry::BlockStateKey;
use crate::tag::{as_compound, as_str, list_compounds, CompoundTag, CompoundTagExt, NumericArray};
use log::{debug, warn};
use std::collections::BTreeMap;

/// From this data version palette indices no longer span two longs.
pub const NON_SPANNING_DATA_VERSION: i32 = 2527;

/// Voxels along one side of a section.
pub const SECTION_SIDE: usize = 16;

pub const SECTION_VOLUME: usize = SECTION_SIDE * SECTION_SIDE * SECTION_SIDE;

const MIN_BITS_PER_INDEX: u32 = 4;

/// Compound holding the column data: `Level` when present, otherwise the root.
pub fn level_of(root: &CompoundTag) -> &CompoundTag {
    root.get_compound("Level").unwrap_or(root)
}

/// Index of a voxel inside its section, `y` then `z` then `x`.
pub fn section_index(x: usize, y: usize, z: usize) -> usize {
    ((y & 15) * SECTION_SIDE + z) * SECTION_SIDE + x
}

/// Read-only view over one decoded column.
pub struct ColumnView<'a> {
    level: &'a CompoundTag,
    data_version: Option<i32>,
    sections: BTreeMap<i8, Section<'a>>,
    section_failures: Vec<SectionReadError>,
}

impl<'a> ColumnView<'a> {
    /// Unpacks every section. Sections which cannot be read are remembered in
    /// `section_failures` and otherwise ignored.
    pub fn new(root: &'a CompoundTag) -> Self {
        let level = level_of(root);
        let data_version = root.get_i32("DataVersion");
        let spanning = data_version.map_or(true, |v| v < NON_SPANNING_DATA_VERSION);

        let mut sections = BTreeMap::new();
        let mut section_failures = Vec::new();

        let section_tags = level
            .get_list("Sections")
            .into_iter()
            .flat_map(|list| list.iter())
            .filter_map(as_compound);

        for section_tag in section_tags {
            match Section::read(section_tag, spanning) {
                Ok(Some(section)) => {
                    sections.insert(section.y, section);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "anvil-convert", "Skipping section: {}", e);
                    section_failures.push(e);
                }
            }
        }

        debug!(
            target: "anvil-convert",
            "Column with data version {:?} has {} sections",
            data_version,
            sections.len()
        );

        ColumnView {
            level,
            data_version,
            sections,
            section_failures,
        }
    }

    pub fn data_version(&self) -> Option<i32> {
        self.data_version
    }

    /// Coordinates stored inside the column.
    pub fn position(&self) -> Option<ChunkPosition> {
        Some(ChunkPosition::new(
            self.level.get_i32("xPos")?,
            self.level.get_i32("zPos")?,
        ))
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section<'a>> {
        self.sections.values()
    }

    pub fn section(&self, y: i8) -> Option<&Section<'a>> {
        self.sections.get(&y)
    }

    pub fn section_failures(&self) -> &[SectionReadError] {
        &self.section_failures
    }

    /// Palette entry of the voxel, `x` and `z` in `0..16`, `y` in `0..256`.
    pub fn block_state_at(&self, x: usize, y: usize, z: usize) -> Option<&'a CompoundTag> {
        let section = self.section((y >> 4) as i8)?;

        section.block_state(section_index(x, y, z))
    }

    /// `Biomes` array of the column, if any.
    pub fn biomes(&self) -> Option<NumericArray<'a>> {
        self.level.get_numeric_array("Biomes")
    }
}

/// One 16x16x16 section with its palette indices unpacked.
#[derive(Debug)]
pub struct Section<'a> {
    y: i8,
    palette: Vec<&'a CompoundTag>,
    indices: Vec<u16>,
}

impl<'a> Section<'a> {
    /// `Ok(None)` for sections without blocks (lighting only or empty palette).
    fn read(tag: &'a CompoundTag, spanning: bool) -> Result<Option<Self>, SectionReadError> {
        let y = tag.get_i8("Y").ok_or(SectionReadError::MissingY)?;

        let palette_list = match tag.get_list("Palette") {
            Some(list) if !list.is_empty() => list,
            _ => {
                if tag.tag("Blocks").is_some() {
                    warn!(
                        target: "anvil-convert",
                        "Section {} stores pre-1.13 Blocks without a Palette, leaving it unset", y
                    );
                }

                return Ok(None);
            }
        };

        let palette = list_compounds(palette_list)
            .map_err(|index| SectionReadError::PaletteNotCompounds { index })?;

        let indices = match tag.get_long_array("BlockStates") {
            Some(data) => {
                let bits = bits_per_index(palette.len());

                unpack_indices(data, bits, spanning).ok_or_else(|| {
                    SectionReadError::BlockStatesLength {
                        expected: packed_length(bits, spanning),
                        found: data.len(),
                    }
                })?
            }
            None if palette.len() == 1 => vec![0; SECTION_VOLUME],
            None => {
                return Err(SectionReadError::MissingBlockStates {
                    palette_length: palette.len(),
                })
            }
        };

        Ok(Some(Section {
            y,
            palette,
            indices,
        }))
    }

    pub fn y(&self) -> i8 {
        self.y
    }

    pub fn palette(&self) -> &[&'a CompoundTag] {
        &self.palette
    }

    /// Palette index of every voxel, in `section_index` order.
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// `None` when the stored index points past the palette.
    pub fn block_state(&self, index: usize) -> Option<&'a CompoundTag> {
        let palette_index = *self.indices.get(index)?;

        self.palette.get(palette_index as usize).copied()
    }
}

/// `max(4, ceil(log2(palette_length)))`.
pub fn bits_per_index(palette_length: usize) -> u32 {
    let needed = if palette_length <= 1 {
        0
    } else {
        64 - ((palette_length - 1) as u64).leading_zeros()
    };

    needed.max(MIN_BITS_PER_INDEX)
}

/// Amount of longs holding one section of indices.
pub fn packed_length(bits: u32, spanning: bool) -> usize {
    if spanning {
        (SECTION_VOLUME * bits as usize + 63) / 64
    } else {
        let per_long = (64 / bits) as usize;
        (SECTION_VOLUME + per_long - 1) / per_long
    }
}

/// Unpacks 4096 indices of `bits` width. With `spanning` an index may start in
/// one long and end in the next, otherwise each long holds `64 / bits` indices
/// and the remaining high bits are padding.
///
/// Returns `None` when `data` has the wrong length for the packing.
pub fn unpack_indices(data: &[i64], bits: u32, spanning: bool) -> Option<Vec<u16>> {
    if bits == 0 || bits > 16 || data.len() != packed_length(bits, spanning) {
        return None;
    }

    let mask = (1u64 << bits) - 1;
    let mut indices = Vec::with_capacity(SECTION_VOLUME);

    if spanning {
        for i in 0..SECTION_VOLUME {
            let bit = i * bits as usize;
            let long = bit / 64;
            let offset = (bit % 64) as u32;

            let mut value = data[long] as u64 >> offset;

            if offset + bits > 64 {
                value |= (data[long + 1] as u64) << (64 - offset);
            }

            indices.push((value & mask) as u16);
        }
    } else {
        let per_long = (64 / bits) as usize;

        for i in 0..SECTION_VOLUME {
            let offset = (i % per_long) as u32 * bits;
            let value = data[i / per_long] as u64 >> offset;

            indices.push((value & mask) as u16);
        }
    }

    Some(indices)
}

/// Inverse of `unpack_indices`.
pub fn pack_indices(indices: &[u16], bits: u32, spanning: bool) -> Vec<i64> {
    let mut data = vec![0u64; packed_length(bits, spanning)];
    let mask = (1u64 << bits) - 1;

    for (i, &index) in indices.iter().enumerate().take(SECTION_VOLUME) {
        let value = index as u64 & mask;

        if spanning {
            let bit = i * bits as usize;
            let long = bit / 64;
            let offset = (bit % 64) as u32;

            data[long] |= value << offset;

            if offset + bits > 64 {
                data[long + 1] |= value >> (64 - offset);
            }
        } else {
            let per_long = (64 / bits) as usize;
            let offset = (i % per_long) as u32 * bits;

            data[i / per_long] |= value << offset;
        }
    }

    data.into_iter().map(|long| long as i64).collect()
}

/// Turns a palette entry into a registry key.
pub fn block_state_key(tag: &CompoundTag) -> Result<BlockStateKey, BlockStateError> {
    let name = tag.get_string("Name").ok_or(BlockStateError::MissingName)?;
    let mut properties = Vec::new();

    if let Some(properties_tag) = tag.get_compound("Properties") {
        for (property, value) in properties_tag.inner() {
            let value = as_str(value)
                .ok_or_else(|| BlockStateError::NonStringProperty {
                    property: property.to_owned(),
                })?;

            properties.push((property.as_str(), value));
        }
    }

    Ok(BlockStateKey::new(name, properties))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{ListTag, TagNode};

    fn compounds(tags: Vec<CompoundTag>) -> TagNode {
        TagNode::List(ListTag::from(
            tags.into_iter().map(TagNode::Compound).collect::<Vec<_>>(),
        ))
    }

    fn block(name: &str, properties: &[(&str, &str)]) -> CompoundTag {
        let mut tag = CompoundTag::new();
        tag.insert("Name", TagNode::String(name.to_owned()));

        if !properties.is_empty() {
            let mut properties_tag = CompoundTag::new();
            for (key, value) in properties {
                properties_tag.insert(*key, TagNode::String((*value).to_owned()));
            }
            tag.insert("Properties", TagNode::Compound(properties_tag));
        }

        tag
    }

    fn section(y: i8, palette: Vec<CompoundTag>, block_states: Option<Vec<i64>>) -> CompoundTag {
        let mut tag = CompoundTag::new();
        tag.insert("Y", TagNode::Byte(y));
        tag.insert("Palette", compounds(palette));

        if let Some(block_states) = block_states {
            tag.insert("BlockStates", TagNode::LongArray(block_states));
        }

        tag
    }

    fn column(data_version: i32, sections: Vec<CompoundTag>) -> CompoundTag {
        let mut level = CompoundTag::new();
        level.insert("xPos", TagNode::Int(3));
        level.insert("zPos", TagNode::Int(-2));
        level.insert("Sections", compounds(sections));

        let mut root = CompoundTag::new();
        root.insert("DataVersion", TagNode::Int(data_version));
        root.insert("Level", TagNode::Compound(level));
        root
    }

    fn sample_indices(palette_length: usize) -> Vec<u16> {
        (0..SECTION_VOLUME)
            .map(|i| ((i * 7 + i / 13) % palette_length) as u16)
            .collect()
    }

    #[test]
    fn test_bits_per_index() {
        assert_eq!(bits_per_index(1), 4);
        assert_eq!(bits_per_index(16), 4);
        assert_eq!(bits_per_index(17), 5);
        assert_eq!(bits_per_index(32), 5);
        assert_eq!(bits_per_index(33), 6);
        assert_eq!(bits_per_index(4096), 12);
    }

    #[test]
    fn test_packed_length() {
        assert_eq!(packed_length(4, true), 256);
        assert_eq!(packed_length(4, false), 256);
        assert_eq!(packed_length(5, true), 320);
        assert_eq!(packed_length(5, false), 342);
        assert_eq!(packed_length(6, false), 410);
    }

    #[test]
    fn test_spanning_index_crosses_long_boundary() {
        // Index 12 of 5 bits occupies bits 60..65.
        let mut data = vec![0i64; 320];
        data[0] = (0b1011u64 << 60) as i64;
        data[1] = 1;

        let indices = unpack_indices(&data, 5, true).unwrap();

        assert_eq!(indices[12], 0b11011);
        assert_eq!(indices[13], 0);
    }

    #[test]
    fn test_non_spanning_skips_padding() {
        // 12 indices of 5 bits per long, the top 4 bits are padding.
        let mut data = vec![0i64; 342];
        data[0] = (0b1111u64 << 60) as i64;
        data[1] = 0b10101;

        let indices = unpack_indices(&data, 5, false).unwrap();

        assert!(indices[..12].iter().all(|&index| index == 0));
        assert_eq!(indices[12], 0b10101);
    }

    #[test]
    fn test_both_packings_unpack_to_same_indices() {
        let indices = sample_indices(20);

        for &spanning in &[true, false] {
            let data = pack_indices(&indices, 5, spanning);

            assert_eq!(unpack_indices(&data, 5, spanning).unwrap(), indices);
        }
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        assert!(unpack_indices(&[0; 255], 4, true).is_none());
        assert!(unpack_indices(&[0; 320], 5, false).is_none());
    }

    #[test]
    fn test_block_state_at() {
        let mut indices = vec![0u16; SECTION_VOLUME];
        indices[section_index(1, 66, 2)] = 1;

        let root = column(
            2586,
            vec![section(
                4,
                vec![block("minecraft:air", &[]), block("minecraft:stone", &[])],
                Some(pack_indices(&indices, 4, false)),
            )],
        );
        let view = ColumnView::new(&root);

        assert_eq!(view.data_version(), Some(2586));
        assert_eq!(view.position(), Some(ChunkPosition::new(3, -2)));
        assert_eq!(
            view.block_state_at(1, 66, 2).unwrap().get_string("Name"),
            Some("minecraft:stone")
        );
        assert_eq!(
            view.block_state_at(0, 66, 2).unwrap().get_string("Name"),
            Some("minecraft:air")
        );
        assert!(view.block_state_at(1, 2, 2).is_none());
    }

    #[test]
    fn test_older_columns_use_spanning_packing() {
        let palette: Vec<_> = (0..20)
            .map(|i| block(&format!("minecraft:block_{}", i), &[]))
            .collect();
        let indices = sample_indices(20);
        let root = column(
            1976,
            vec![section(0, palette, Some(pack_indices(&indices, 5, true)))],
        );
        let view = ColumnView::new(&root);

        assert_eq!(view.section(0).unwrap().indices(), indices.as_slice());
        assert!(view.section_failures().is_empty());
    }

    #[test]
    fn test_single_entry_palette_fills_section() {
        let root = column(2586, vec![section(1, vec![block("minecraft:stone", &[])], None)]);
        let view = ColumnView::new(&root);

        assert_eq!(
            view.block_state_at(15, 31, 15).unwrap().get_string("Name"),
            Some("minecraft:stone")
        );
    }

    #[test]
    fn test_bad_sections_are_skipped() {
        let mut lighting_only = CompoundTag::new();
        lighting_only.insert("Y", TagNode::Byte(-1));
        let mut not_compounds = CompoundTag::new();
        not_compounds.insert("Y", TagNode::Byte(3));
        not_compounds.insert(
            "Palette",
            TagNode::List(ListTag::from(vec![
                TagNode::Compound(block("minecraft:dirt", &[])),
                TagNode::String("minecraft:stone".to_owned()),
            ])),
        );

        let root = column(
            2586,
            vec![
                lighting_only,
                section(
                    0,
                    vec![block("minecraft:air", &[]), block("minecraft:dirt", &[])],
                    None,
                ),
                section(
                    1,
                    vec![block("minecraft:air", &[]), block("minecraft:dirt", &[])],
                    Some(vec![0; 10]),
                ),
                section(2, vec![block("minecraft:dirt", &[])], None),
                not_compounds,
            ],
        );
        let view = ColumnView::new(&root);

        assert_eq!(view.sections().count(), 1);
        assert_eq!(
            view.section_failures(),
            &[
                SectionReadError::MissingBlockStates { palette_length: 2 },
                SectionReadError::BlockStatesLength {
                    expected: 256,
                    found: 10
                },
                SectionReadError::PaletteNotCompounds { index: 1 },
            ]
        );
    }

    #[test]
    fn test_pre_flattening_section_is_left_unset() {
        let mut legacy = CompoundTag::new();
        legacy.insert("Y", TagNode::Byte(0));
        legacy.insert("Blocks", TagNode::ByteArray(vec![1; SECTION_VOLUME]));
        legacy.insert("Data", TagNode::ByteArray(vec![0; SECTION_VOLUME / 2]));

        let root = column(1343, vec![legacy]);
        let view = ColumnView::new(&root);

        assert_eq!(view.sections().count(), 0);
        assert!(view.section_failures().is_empty());
        assert!(view.block_state_at(0, 0, 0).is_none());
    }

    #[test]
    fn test_level_of_falls_back_to_root() {
        let mut root = CompoundTag::new();
        root.insert("xPos", TagNode::Int(1));

        assert_eq!(level_of(&root).get_i32("xPos"), Some(1));
    }

    #[test]
    fn test_block_state_key() {
        let key = block_state_key(&block(
            "minecraft:oak_log",
            &[("axis", "y"), ("LIT", "false")],
        ))
        .unwrap();

        assert_eq!(key.name(), "OAK_LOG");
        assert_eq!(key.descriptor(), "LIT=false,axis=y");
    }

    #[test]
    fn test_malformed_block_state() {
        let mut tag = block("minecraft:oak_log", &[]);
        let mut properties = CompoundTag::new();
        properties.insert("axis", TagNode::Byte(1));
        tag.insert("Properties", TagNode::Compound(properties));

        assert_eq!(
            block_state_key(&tag),
            Err(BlockStateError::NonStringProperty {
                property: "axis".to_owned()
            })
        );
        assert_eq!(
            block_state_key(&CompoundTag::new()),
            Err(BlockStateError::MissingName)
        );
    }
}
