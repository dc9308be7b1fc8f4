use crate::column::level_of;
use crate::error::{ColumnReadError, RegionLoadError, RegionWriteError};
use crate::position::{ChunkPosition, RegionChunkPosition, RegionPosition};
use crate::provider::region_position_from_filename;
use crate::tag::{read_nbt, write_nbt, CompoundTag, CompoundTagExt, Flavor};
use bitvec::prelude::*;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

/// Amount of chunks in region.
const REGION_CHUNKS: usize = 1024;
/// Length of chunks metadata in region.
const REGION_CHUNKS_METADATA_LENGTH: usize = 2 * REGION_CHUNKS;
/// Region header length in bytes.
const REGION_HEADER_BYTES_LENGTH: u64 = 8 * REGION_CHUNKS as u64;
/// Sectors occupied by the header.
const REGION_HEADER_SECTORS: usize = 2;
/// Region sector length in bytes.
const REGION_SECTOR_BYTES_LENGTH: u16 = 4096;
/// Maximum chunk length in bytes.
const CHUNK_MAXIMUM_BYTES_LENGTH: u32 = REGION_SECTOR_BYTES_LENGTH as u32 * 256;

/// Gzip compression type value.
const GZIP_COMPRESSION_TYPE: u8 = 1;
/// Zlib compression type value.
const ZLIB_COMPRESSION_TYPE: u8 = 2;
/// Payload stored without compression.
const UNCOMPRESSED_COMPRESSION_TYPE: u8 = 3;
/// Set when the payload lives in a separate `.mcc` file.
const EXTERNAL_PAYLOAD_FLAG: u8 = 0x80;

/// Region represents a 32x32 group of decoded columns.
///
/// Immutable once loaded; columns that failed to decode are absent and listed
/// in `failures`.
#[derive(Debug)]
pub struct RegionFile {
    position: RegionPosition,
    columns: BTreeMap<RegionChunkPosition, Column>,
    failures: Vec<ColumnFailure>,
}

#[derive(Debug)]
struct Column {
    tag: CompoundTag,
    /// Name of the root compound, written back unchanged.
    root_name: String,
    /// Last time in seconds when column was modified.
    last_modified_timestamp: u32,
}

/// Column which was present in the header but could not be decoded.
#[derive(Debug)]
pub struct ColumnFailure {
    pub position: RegionChunkPosition,
    pub error: ColumnReadError,
}

impl RegionFile {
    /// Creates a region without columns.
    pub fn new(position: RegionPosition) -> Self {
        RegionFile {
            position,
            columns: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Reads a region file fully into memory. Region coordinates come from the
    /// file name.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegionLoadError> {
        let path = path.as_ref();
        let position = region_position_from_filename(path).ok_or_else(|| {
            RegionLoadError::InvalidFileName {
                file_name: path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned(),
            }
        })?;

        let bytes = fs::read(path)?;

        Self::from_bytes(position, &bytes)
    }

    pub fn from_bytes(position: RegionPosition, bytes: &[u8]) -> Result<Self, RegionLoadError> {
        let source_len = bytes.len() as u64;
        let mut region = RegionFile::new(position);

        if source_len == 0 {
            debug!(target: "anvil-convert", "Region {} is empty", position);
            return Ok(region);
        }

        if REGION_HEADER_BYTES_LENGTH > source_len {
            return Err(RegionLoadError::TruncatedHeader { length: source_len });
        }

        let chunks_metadata = read_header(&mut Cursor::new(bytes))?;
        let total_sectors = (bytes.len() + (REGION_SECTOR_BYTES_LENGTH as usize - 1))
            / REGION_SECTOR_BYTES_LENGTH as usize;

        // First two sectors are used to store metadata.
        let mut used_sectors = bitvec![0; total_sectors];

        for index in 0..REGION_HEADER_SECTORS {
            used_sectors.set(index, true);
        }

        for (index, metadata) in chunks_metadata.iter().enumerate() {
            if metadata.is_empty() {
                continue;
            }

            let local = RegionChunkPosition::from_index(index);
            let result = claim_sectors(&mut used_sectors, metadata)
                .and_then(|_| read_column(bytes, metadata))
                .and_then(|column| match column {
                    Some((tag, root_name)) => {
                        check_position(position, local, &tag).map(|_| Some((tag, root_name)))
                    }
                    None => Ok(None),
                });

            match result {
                Ok(Some((tag, root_name))) => {
                    region.columns.insert(
                        local,
                        Column {
                            tag,
                            root_name,
                            last_modified_timestamp: metadata.last_modified_timestamp,
                        },
                    );
                }
                Ok(None) => {
                    debug!(
                        target: "anvil-convert",
                        "Region {} column {} has zero length", position, local
                    );
                }
                Err(error) => {
                    warn!(
                        target: "anvil-convert",
                        "Region {} column {} skipped: {}", position, local, error
                    );
                    region.failures.push(ColumnFailure {
                        position: local,
                        error,
                    });
                }
            }
        }

        debug!(
            target: "anvil-convert",
            "Region {} loaded with {} columns and {} failures",
            position,
            region.columns.len(),
            region.failures.len()
        );

        Ok(region)
    }

    pub fn position(&self) -> RegionPosition {
        self.position
    }

    /// Returns decoded column at specified local coordinates.
    pub fn column(&self, local: RegionChunkPosition) -> Option<&CompoundTag> {
        self.columns.get(&local).map(|column| &column.tag)
    }

    pub fn last_modified(&self, local: RegionChunkPosition) -> Option<u32> {
        self.columns
            .get(&local)
            .map(|column| column.last_modified_timestamp)
    }

    /// Present columns, ordered by local x then z.
    pub fn columns(&self) -> impl Iterator<Item = (RegionChunkPosition, &CompoundTag)> {
        self.columns.iter().map(|(local, column)| (*local, &column.tag))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn failures(&self) -> &[ColumnFailure] {
        &self.failures
    }

    /// Adds a column with an unnamed root while assembling a region in memory.
    pub fn insert_column(
        &mut self,
        local: RegionChunkPosition,
        tag: CompoundTag,
        last_modified_timestamp: u32,
    ) {
        self.columns.insert(
            local,
            Column {
                tag,
                root_name: String::new(),
                last_modified_timestamp,
            },
        );
    }

    /// Writes the header followed by every column, zlib compressed, in
    /// consecutive sectors.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), RegionWriteError> {
        let mut chunks_metadata = [ChunkMetadata::default(); REGION_CHUNKS];
        let mut body = Vec::new();
        let mut next_sector = REGION_HEADER_SECTORS as u32;

        for (local, column) in &self.columns {
            let mut buffer = Vec::new();
            buffer.write_u8(ZLIB_COMPRESSION_TYPE)?;
            write_nbt(
                &mut buffer,
                Some(column.root_name.as_str()),
                &column.tag,
                Flavor::ZlibCompressed,
            )?;

            // 4 bytes for data length.
            let length = buffer.len() + 4;

            if length > CHUNK_MAXIMUM_BYTES_LENGTH as usize {
                return Err(RegionWriteError::LengthExceedsMaximum { length });
            }

            let sector_len = REGION_SECTOR_BYTES_LENGTH as usize;
            let sectors = (length + sector_len - 1) / sector_len;

            body.write_u32::<BigEndian>(buffer.len() as u32)?;
            body.write_all(&buffer)?;

            // Padding to align sector.
            body.resize(body.len() + sectors * sector_len - length, 0);

            chunks_metadata[local.metadata_index()] = ChunkMetadata::new(
                next_sector,
                sectors as u8,
                column.last_modified_timestamp,
            );
            next_sector += sectors as u32;
        }

        for metadata in chunks_metadata.iter() {
            let offset = (metadata.start_sector_index << 8) | metadata.sectors as u32;
            writer.write_u32::<BigEndian>(offset)?;
        }

        for metadata in chunks_metadata.iter() {
            writer.write_u32::<BigEndian>(metadata.last_modified_timestamp)?;
        }

        writer.write_all(&body)?;
        Ok(())
    }
}

/// Marks the column sectors as used, rejecting the column when they point into
/// the header, past the end of the file or into another column.
fn claim_sectors(
    used_sectors: &mut BitVec,
    metadata: &ChunkMetadata,
) -> Result<(), ColumnReadError> {
    let start_index = metadata.start_sector_index as usize;
    let end_index = start_index + metadata.sectors as usize;

    if start_index < REGION_HEADER_SECTORS {
        return Err(ColumnReadError::InvalidOffset {
            start_sector: metadata.start_sector_index,
        });
    }

    if end_index > used_sectors.len() {
        return Err(ColumnReadError::OutOfBounds {
            start_sector: metadata.start_sector_index,
            sectors: metadata.sectors,
            file_sectors: used_sectors.len(),
        });
    }

    if used_sectors[start_index..end_index].any() {
        return Err(ColumnReadError::OverlappingSectors {
            start_sector: metadata.start_sector_index,
            sectors: metadata.sectors,
        });
    }

    used_sectors[start_index..end_index].fill(true);
    Ok(())
}

/// Decompresses and decodes the column stored in the given sectors.
///
/// Returns `None` when the stored length is zero, otherwise the root compound
/// and its name.
fn read_column(
    bytes: &[u8],
    metadata: &ChunkMetadata,
) -> Result<Option<(CompoundTag, String)>, ColumnReadError> {
    let seek_offset = metadata.start_sector_index as usize * REGION_SECTOR_BYTES_LENGTH as usize;
    let available = (bytes.len() - seek_offset)
        .min(metadata.sectors as usize * REGION_SECTOR_BYTES_LENGTH as usize);
    let maximum_length = (available.saturating_sub(4) as u32).min(CHUNK_MAXIMUM_BYTES_LENGTH);

    let mut cursor = Cursor::new(&bytes[seek_offset..seek_offset + available]);
    let length = cursor.read_u32::<BigEndian>()?;

    if length == 0 {
        return Ok(None);
    }

    if length > maximum_length {
        return Err(ColumnReadError::LengthExceedsMaximum {
            length,
            maximum_length,
        });
    }

    let compression_scheme = bytes[seek_offset + 4];
    let mut payload = &bytes[seek_offset + 5..seek_offset + 4 + length as usize];

    let flavor = match compression_scheme {
        GZIP_COMPRESSION_TYPE => Flavor::GzCompressed,
        ZLIB_COMPRESSION_TYPE => Flavor::ZlibCompressed,
        UNCOMPRESSED_COMPRESSION_TYPE => Flavor::Uncompressed,
        compression_scheme => {
            if compression_scheme & EXTERNAL_PAYLOAD_FLAG != 0 {
                debug!(target: "anvil-convert", "Column payload stored in external file");
            }

            return Err(ColumnReadError::UnsupportedCompressionScheme { compression_scheme });
        }
    };

    Ok(Some(read_nbt(&mut payload, flavor)?))
}

/// Embedded `xPos`/`zPos`, when present, must match the slot the column was
/// read from.
fn check_position(
    region: RegionPosition,
    local: RegionChunkPosition,
    tag: &CompoundTag,
) -> Result<(), ColumnReadError> {
    let level = level_of(tag);
    let expected = local.to_chunk_position(region);

    if let (Some(x), Some(z)) = (level.get_i32("xPos"), level.get_i32("zPos")) {
        if x != expected.x || z != expected.z {
            return Err(ColumnReadError::PositionMismatch {
                expected,
                found: ChunkPosition::new(x, z),
            });
        }
    }

    Ok(())
}

/// First 8KB of source are header of 1024 offsets and 1024 timestamps.
fn read_header<S: Read>(source: &mut S) -> Result<[ChunkMetadata; REGION_CHUNKS], io::Error> {
    let mut chunks_metadata = [ChunkMetadata::default(); REGION_CHUNKS];
    let mut values = [0u32; REGION_CHUNKS_METADATA_LENGTH];

    source.read_u32_into::<BigEndian>(&mut values)?;

    for index in 0..REGION_CHUNKS {
        let last_modified_timestamp = values[REGION_CHUNKS + index];
        let offset = values[index];

        let start_sector_index = offset >> 8;
        let sectors = (offset & 0xFF) as u8;

        chunks_metadata[index] =
            ChunkMetadata::new(start_sector_index, sectors, last_modified_timestamp);
    }

    Ok(chunks_metadata)
}

/// Chunk metadata are stored in header.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
struct ChunkMetadata {
    /// Sector index from which starts chunk data.
    start_sector_index: u32,
    /// Amount of sectors used to store chunk.
    sectors: u8,
    /// Last time in seconds when chunk was modified.
    last_modified_timestamp: u32,
}

impl ChunkMetadata {
    fn new(start_sector_index: u32, sectors: u8, last_modified_timestamp: u32) -> Self {
        ChunkMetadata {
            start_sector_index,
            sectors,
            last_modified_timestamp,
        }
    }

    /// Entry without sectors means the column is absent.
    fn is_empty(&self) -> bool {
        self.sectors == 0
    }
}
