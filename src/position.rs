use serde::Serialize;
use std::fmt;

/// Amount of columns along one side of a region.
pub const REGION_SIDE: i32 = 32;

/// Absolute chunk coordinates.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Serialize)]
pub struct ChunkPosition {
    pub x: i32,
    pub z: i32,
}

impl ChunkPosition {
    pub fn new(x: i32, z: i32) -> ChunkPosition {
        ChunkPosition { x, z }
    }

    pub fn region(&self) -> RegionPosition {
        RegionPosition::from_chunk_position(self.x, self.z)
    }

    pub fn region_chunk(&self) -> RegionChunkPosition {
        RegionChunkPosition::from_chunk_position(self.x, self.z)
    }
}

impl fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.z)
    }
}

#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone)]
pub struct RegionPosition {
    pub x: i32,
    pub z: i32,
}

impl RegionPosition {
    pub fn new(x: i32, z: i32) -> RegionPosition {
        RegionPosition { x, z }
    }

    /// Arithmetic shift floors towards negative infinity, so chunk -1 lands in
    /// region -1.
    pub fn from_chunk_position(chunk_x: i32, chunk_z: i32) -> RegionPosition {
        let x = chunk_x >> 5;
        let z = chunk_z >> 5;

        RegionPosition::new(x, z)
    }
}

impl fmt::Display for RegionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.z)
    }
}

/// Column coordinates inside a region, both in `0..32`.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone)]
pub struct RegionChunkPosition {
    pub x: u8,
    pub z: u8,
}

impl RegionChunkPosition {
    pub fn new(x: u8, z: u8) -> RegionChunkPosition {
        debug_assert!(32 > x, "Region chunk x coordinate out of bounds");
        debug_assert!(32 > z, "Region chunk z coordinate out of bounds");

        RegionChunkPosition { x, z }
    }

    pub fn from_chunk_position(chunk_x: i32, chunk_z: i32) -> RegionChunkPosition {
        let x = (chunk_x & 31) as u8;
        let z = (chunk_z & 31) as u8;

        RegionChunkPosition::new(x, z)
    }

    /// Inverse of `metadata_index`.
    pub fn from_index(index: usize) -> RegionChunkPosition {
        debug_assert!(index < 1024, "Region chunk index out of bounds");

        RegionChunkPosition::new((index % 32) as u8, (index / 32) as u8)
    }

    /// Header slot of this column; the header is ordered by z, then x.
    pub fn metadata_index(&self) -> usize {
        self.x as usize + self.z as usize * 32
    }

    pub fn to_chunk_position(&self, region: RegionPosition) -> ChunkPosition {
        ChunkPosition::new(
            region.x * REGION_SIDE + self.x as i32,
            region.z * REGION_SIDE + self.z as i32,
        )
    }
}

impl fmt::Display for RegionChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.z)
    }
}
