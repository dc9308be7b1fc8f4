use crate::position::ChunkPosition;
use crate::tag::NbtIoError;
use std::path::PathBuf;
use std::{error::Error, fmt::Display, io};

/// Possible errors while loading a whole region file.
///
/// Any of these aborts the run.
#[derive(Debug)]
pub enum RegionLoadError {
    /// File name does not follow `r.<x>.<z>.<ext>`.
    InvalidFileName { file_name: String },
    /// File is not empty but shorter than the 8 KiB header.
    TruncatedHeader { length: u64 },
    /// I/O Error which happened while reading the region file.
    IOError { io_error: io::Error },
}

impl From<io::Error> for RegionLoadError {
    fn from(io_error: io::Error) -> Self {
        RegionLoadError::IOError { io_error }
    }
}

impl Error for RegionLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegionLoadError::IOError { io_error } => Some(io_error),
            _ => None,
        }
    }
}

impl Display for RegionLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RegionLoadError::*;
        match self {
            InvalidFileName { file_name } => {
                write!(f, "Region file name {} is not r.<x>.<z>.<ext>", file_name)
            }
            TruncatedHeader { length } => write!(
                f,
                "Region file of {} bytes is shorter than its header",
                length
            ),
            IOError { io_error } => write!(f, "IO Error: {}", io_error),
        }
    }
}

/// Possible errors while reading one column of a region.
///
/// The column is treated as absent, the rest of the region still loads.
#[derive(Debug)]
pub enum ColumnReadError {
    /// Column data would start inside the header.
    InvalidOffset { start_sector: u32 },
    /// Column sectors run past the end of the file.
    OutOfBounds {
        start_sector: u32,
        sectors: u8,
        file_sectors: usize,
    },
    /// Column sectors are already claimed by another column.
    OverlappingSectors { start_sector: u32, sectors: u8 },
    /// Column length overlaps declared maximum.
    ///
    /// Region file are corrupted.
    LengthExceedsMaximum {
        /// Column length.
        length: u32,
        /// Column maximum expected length.
        maximum_length: u32,
    },
    /// Only gzip, zlib and uncompressed payloads stored inside the region are
    /// understood.
    UnsupportedCompressionScheme {
        /// Compression scheme type id.
        compression_scheme: u8,
    },
    /// Error while decompressing or decoding binary data to a tag tree.
    TagDecodeError { tag_decode_error: NbtIoError },
    /// Coordinates stored inside the column disagree with its slot.
    PositionMismatch {
        expected: ChunkPosition,
        found: ChunkPosition,
    },
    /// Column sectors end before its length prefix.
    IOError { io_error: io::Error },
}

impl From<io::Error> for ColumnReadError {
    fn from(io_error: io::Error) -> Self {
        ColumnReadError::IOError { io_error }
    }
}

impl From<NbtIoError> for ColumnReadError {
    fn from(tag_decode_error: NbtIoError) -> Self {
        ColumnReadError::TagDecodeError { tag_decode_error }
    }
}

impl Error for ColumnReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ColumnReadError::TagDecodeError { tag_decode_error } => Some(tag_decode_error),
            ColumnReadError::IOError { io_error } => Some(io_error),
            _ => None,
        }
    }
}

impl Display for ColumnReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ColumnReadError::*;
        match self {
            InvalidOffset { start_sector } => {
                write!(f, "Column starts at header sector {}", start_sector)
            }
            OutOfBounds {
                start_sector,
                sectors,
                file_sectors,
            } => write!(
                f,
                "Column sectors {}..{} exceed file of {} sectors",
                start_sector,
                *start_sector as usize + *sectors as usize,
                file_sectors
            ),
            OverlappingSectors {
                start_sector,
                sectors,
            } => write!(
                f,
                "Column sectors {}..{} overlap another column",
                start_sector,
                *start_sector as usize + *sectors as usize
            ),
            LengthExceedsMaximum {
                length,
                maximum_length,
            } => write!(
                f,
                "Column length of {} exceeds maximum ({})",
                length, maximum_length
            ),
            UnsupportedCompressionScheme { compression_scheme } => {
                write!(f, "Unsupported compression scheme: {}", compression_scheme)
            }
            TagDecodeError { tag_decode_error } => {
                write!(f, "Failed to decode column: {}", tag_decode_error)
            }
            PositionMismatch { expected, found } => write!(
                f,
                "Column stored as chunk {} claims to be chunk {}",
                expected, found
            ),
            IOError { io_error } => write!(f, "IO Error: {}", io_error),
        }
    }
}

/// Possible errors while writing a region file.
#[derive(Debug)]
pub enum RegionWriteError {
    /// Compressed column does not fit into 256 sectors.
    LengthExceedsMaximum { length: usize },
    /// Column could not be encoded.
    TagEncodeError { tag_encode_error: NbtIoError },
    IOError { io_error: io::Error },
}

impl From<io::Error> for RegionWriteError {
    fn from(io_error: io::Error) -> Self {
        RegionWriteError::IOError { io_error }
    }
}

impl From<NbtIoError> for RegionWriteError {
    fn from(tag_encode_error: NbtIoError) -> Self {
        RegionWriteError::TagEncodeError { tag_encode_error }
    }
}

impl Error for RegionWriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegionWriteError::TagEncodeError { tag_encode_error } => Some(tag_encode_error),
            RegionWriteError::IOError { io_error } => Some(io_error),
            _ => None,
        }
    }
}

impl Display for RegionWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RegionWriteError::*;
        match self {
            LengthExceedsMaximum { length } => {
                write!(f, "Column length of {} exceeds maximum (1mb)", length)
            }
            TagEncodeError { tag_encode_error } => {
                write!(f, "Failed to encode column: {}", tag_encode_error)
            }
            IOError { io_error } => write!(f, "IO Error: {}", io_error),
        }
    }
}

/// Possible errors while loading the set of region files.
#[derive(Debug)]
pub enum ProviderError {
    /// Input directory does not exist or is not a directory.
    MissingDirectory { path: PathBuf },
    /// Region file could not be loaded.
    RegionLoadError {
        path: PathBuf,
        region_load_error: RegionLoadError,
    },
    /// I/O Error while listing the input directory.
    IOError { io_error: io::Error },
}

impl From<io::Error> for ProviderError {
    fn from(io_error: io::Error) -> Self {
        ProviderError::IOError { io_error }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProviderError::RegionLoadError {
                region_load_error, ..
            } => Some(region_load_error),
            ProviderError::IOError { io_error } => Some(io_error),
            _ => None,
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ProviderError::*;
        match self {
            MissingDirectory { path } => {
                write!(f, "Region directory {} not found", path.display())
            }
            RegionLoadError {
                path,
                region_load_error,
            } => write!(f, "Failed to load {}: {}", path.display(), region_load_error),
            IOError { io_error } => write!(f, "IO Error: {}", io_error),
        }
    }
}

/// Possible errors while loading the block registry.
#[derive(Debug)]
pub enum RegistryLoadError {
    /// Block declares states but none of them is marked default.
    NoDefaultState { name: String },
    /// Registry source is not valid JSON of the expected shape.
    JsonError { json_error: serde_json::Error },
    /// I/O Error while reading the registry source.
    IOError { io_error: io::Error },
}

impl From<io::Error> for RegistryLoadError {
    fn from(io_error: io::Error) -> Self {
        RegistryLoadError::IOError { io_error }
    }
}

impl From<serde_json::Error> for RegistryLoadError {
    fn from(json_error: serde_json::Error) -> Self {
        RegistryLoadError::JsonError { json_error }
    }
}

impl Error for RegistryLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryLoadError::JsonError { json_error } => Some(json_error),
            RegistryLoadError::IOError { io_error } => Some(io_error),
            _ => None,
        }
    }
}

impl Display for RegistryLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RegistryLoadError::*;
        match self {
            NoDefaultState { name } => write!(f, "Block {} has no default state", name),
            JsonError { json_error } => write!(f, "Invalid registry: {}", json_error),
            IOError { io_error } => write!(f, "IO Error: {}", io_error),
        }
    }
}

/// Block state that is not known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Normalized block name not present.
    UnknownBlock { name: String },
    /// Block exists, the property combination does not.
    UnknownState { name: String, descriptor: String },
}

impl Error for ResolveError {}

impl Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ResolveError::*;
        match self {
            UnknownBlock { name } => write!(f, "Unknown block {}", name),
            UnknownState { name, descriptor } => {
                write!(f, "Unknown state {}[{}]", name, descriptor)
            }
        }
    }
}

/// Possible errors while saving or flushing converted chunks.
#[derive(Debug)]
pub enum StoreError {
    /// Converted chunk could not be encoded.
    TagEncodeError { tag_encode_error: NbtIoError },
    /// Manifest could not be written.
    JsonError { json_error: serde_json::Error },
    /// I/O Error while writing to the output directory.
    IOError { io_error: io::Error },
}

impl From<io::Error> for StoreError {
    fn from(io_error: io::Error) -> Self {
        StoreError::IOError { io_error }
    }
}

impl From<NbtIoError> for StoreError {
    fn from(tag_encode_error: NbtIoError) -> Self {
        StoreError::TagEncodeError { tag_encode_error }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(json_error: serde_json::Error) -> Self {
        StoreError::JsonError { json_error }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use StoreError::*;
        match self {
            TagEncodeError { tag_encode_error } => Some(tag_encode_error),
            JsonError { json_error } => Some(json_error),
            IOError { io_error } => Some(io_error),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use StoreError::*;
        match self {
            TagEncodeError { tag_encode_error } => {
                write!(f, "Failed to encode chunk: {}", tag_encode_error)
            }
            JsonError { json_error } => write!(f, "Failed to write manifest: {}", json_error),
            IOError { io_error } => write!(f, "IO Error: {}", io_error),
        }
    }
}

/// Possible errors while reading one section of a column.
///
/// The voxels of the section are left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionReadError {
    /// Section has no `Y` byte.
    MissingY,
    /// `Palette` holds something other than a compound.
    PaletteNotCompounds { index: usize },
    /// Palette with more than one entry but no `BlockStates`.
    MissingBlockStates { palette_length: usize },
    /// `BlockStates` does not hold the amount of longs the palette implies.
    BlockStatesLength { expected: usize, found: usize },
}

impl Error for SectionReadError {}

impl Display for SectionReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use SectionReadError::*;
        match self {
            MissingY => write!(f, "Section has no Y"),
            PaletteNotCompounds { index } => {
                write!(f, "Palette entry {} is not a compound", index)
            }
            MissingBlockStates { palette_length } => write!(
                f,
                "Palette of {} entries without block states",
                palette_length
            ),
            BlockStatesLength { expected, found } => write!(
                f,
                "Block states hold {} longs, expected {}",
                found, expected
            ),
        }
    }
}

/// Block state compound that cannot describe a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStateError {
    /// No `Name` string.
    MissingName,
    /// `Properties` value which is not a string.
    NonStringProperty { property: String },
}

impl Error for BlockStateError {}

impl Display for BlockStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockStateError::MissingName => write!(f, "Block state has no name"),
            BlockStateError::NonStringProperty { property } => {
                write!(f, "Block state property {} is not a string", property)
            }
        }
    }
}

/// Possible errors of a whole conversion run.
#[derive(Debug)]
pub enum RunError {
    /// Worker pool could not be started.
    ThreadPoolError {
        thread_pool_error: rayon::ThreadPoolBuildError,
    },
    /// Every chunk completed but the final flush failed.
    FlushError { store_error: StoreError },
    /// Flush panicked before producing an outcome.
    FlushPanicked,
}

impl From<rayon::ThreadPoolBuildError> for RunError {
    fn from(thread_pool_error: rayon::ThreadPoolBuildError) -> Self {
        RunError::ThreadPoolError { thread_pool_error }
    }
}

impl From<StoreError> for RunError {
    fn from(store_error: StoreError) -> Self {
        RunError::FlushError { store_error }
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunError::ThreadPoolError { thread_pool_error } => Some(thread_pool_error),
            RunError::FlushError { store_error } => Some(store_error),
            RunError::FlushPanicked => None,
        }
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RunError::*;
        match self {
            ThreadPoolError { thread_pool_error } => {
                write!(f, "Failed to start workers: {}", thread_pool_error)
            }
            FlushError { store_error } => write!(f, "Flush failed: {}", store_error),
            FlushPanicked => write!(f, "Flush panicked"),
        }
    }
}
