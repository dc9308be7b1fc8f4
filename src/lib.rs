//! Converts Anvil region files into engine-agnostic chunk batches.
//!
//! Regions are decoded up front into a read-only [`RegionSet`]; every requested
//! chunk is then converted by a [`ChunkConverter`] into a [`WriteBatch`],
//! handed to a [`ChunkStore`] and counted by a [`FlushCoordinator`], which
//! flushes the store once the last chunk completed.

pub mod barrier;
pub mod batch;
pub mod biome;
pub mod column;
pub mod config;
pub mod convert;
pub mod error;
pub mod position;
pub mod provider;
pub mod region;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod tag;
#[cfg(feature = "zip")]
pub mod zip_region_provider;

pub use barrier::{CompletionBarrier, FlushCoordinator};
pub use batch::WriteBatch;
pub use biome::{Biome, BiomeTable};
pub use convert::{ChunkConverter, Conversion, ConversionStats};
pub use error::*;
pub use position::{ChunkPosition, RegionChunkPosition, RegionPosition};
pub use provider::{FolderRegionProvider, RegionSet};
pub use region::RegionFile;
pub use registry::{BlockRegistry, BlockStateId, BlockStateKey};
pub use runtime::{requested_chunks, ConversionRun, ConversionTask, RunSummary, TaskState};
pub use store::{ChunkStore, FlushReport, FolderChunkStore, MemoryChunkStore};
pub use tag::{CompoundTag, CompoundTagExt, ListTag, TagNode};
#[cfg(feature = "zip")]
pub use zip_region_provider::{ZipProviderError, ZipRegionProvider};
