use crate::error::ProviderError;
use crate::position::{ChunkPosition, RegionPosition};
use crate::region::RegionFile;
use crate::tag::CompoundTag;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Every decoded region of one run, keyed by region position.
///
/// Filled once before conversion starts and only read afterwards.
#[derive(Debug, Default)]
pub struct RegionSet {
    regions: HashMap<RegionPosition, RegionFile>,
}

impl RegionSet {
    pub fn new() -> Self {
        RegionSet::default()
    }

    /// Adds a region, returning the one previously stored at its position.
    pub fn insert(&mut self, region: RegionFile) -> Option<RegionFile> {
        self.regions.insert(region.position(), region)
    }

    pub fn get(&self, position: RegionPosition) -> Option<&RegionFile> {
        self.regions.get(&position)
    }

    /// Column owning the given chunk, if its region was loaded and holds it.
    pub fn column(&self, chunk: ChunkPosition) -> Option<&CompoundTag> {
        self.get(chunk.region())?.column(chunk.region_chunk())
    }

    /// Every present column as an absolute chunk position, sorted.
    pub fn chunk_positions(&self) -> Vec<ChunkPosition> {
        let mut positions: Vec<_> = self
            .regions
            .values()
            .flat_map(|region| {
                let region_position = region.position();

                region
                    .columns()
                    .map(move |(local, _)| local.to_chunk_position(region_position))
            })
            .collect();

        positions.sort();
        positions
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionFile> {
        self.regions.values()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Loads every region file found directly inside one folder.
pub struct FolderRegionProvider {
    /// Folder where region files located.
    folder_path: PathBuf,
}

impl FolderRegionProvider {
    /// Fails when the folder does not exist.
    pub fn new<P: AsRef<Path>>(folder: P) -> Result<Self, ProviderError> {
        let folder_path = folder.as_ref().to_path_buf();

        if !folder_path.is_dir() {
            return Err(ProviderError::MissingDirectory { path: folder_path });
        }

        Ok(FolderRegionProvider { folder_path })
    }

    /// Paths of region files in the folder; other files are ignored.
    pub fn region_paths(&self) -> Result<Vec<(RegionPosition, PathBuf)>, ProviderError> {
        let mut paths: Vec<_> = read_dir(&self.folder_path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter_map(|path| region_position_from_filename(&path).map(|pos| (pos, path)))
            .collect();

        paths.sort();
        Ok(paths)
    }

    /// Decodes every region file. An unreadable file or header aborts loading.
    pub fn load_all(&self) -> Result<RegionSet, ProviderError> {
        let mut regions = RegionSet::new();

        for (position, path) in self.region_paths()? {
            debug!(target: "anvil-convert", "Loading region {} from {}", position, path.display());

            let region = RegionFile::load(&path).map_err(|region_load_error| {
                ProviderError::RegionLoadError {
                    path: path.clone(),
                    region_load_error,
                }
            })?;

            regions.insert(region);
        }

        info!(
            target: "anvil-convert",
            "Loaded {} regions from {}",
            regions.len(),
            self.folder_path.display()
        );

        Ok(regions)
    }
}

/// Parses `r.<x>.<z>.<ext>` into region coordinates.
pub fn region_position_from_filename(path: &Path) -> Option<RegionPosition> {
    // A name which is not UTF-8 gets replacement characters and fails `parse_coords`.
    let filename = path.file_name().unwrap_or_default().to_string_lossy();
    let parts: Vec<_> = filename.split('.').collect();

    let (x, z) = parse_coords(&parts)?;

    Some(RegionPosition::new(x, z))
}

pub fn region_position_filename(pos: RegionPosition) -> String {
    format!("r.{}.{}.mca", pos.x, pos.z)
}

fn parse_coords(parts: &[&str]) -> Option<(i32, i32)> {
    let incorrect_format = parts.len() != 4 || parts[0] != "r" || parts[3].is_empty();

    if incorrect_format {
        return None;
    }

    Some((i32::from_str(parts[1]).ok()?, i32::from_str(parts[2]).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::RegionChunkPosition;
    use crate::tag::TagNode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_position_parse() {
        let mut path = PathBuf::new();
        path.set_file_name("r.-1.1.mca");

        let pos = region_position_from_filename(&path).unwrap();
        assert_eq!(RegionPosition { x: -1, z: 1 }, pos)
    }

    #[test]
    fn test_position_parse_other_extension() {
        let pos = region_position_from_filename(Path::new("world/region/r.3.-4.mcr")).unwrap();

        assert_eq!(RegionPosition::new(3, -4), pos);
    }

    #[test]
    fn test_position_parse_invalid_format() {
        for name in &[
            "this is not a valid region.filename",
            "r.1.mca",
            "r.a.b.mca",
            "r.1.2.",
            "x.1.2.mca",
            "r.1.2.mca.bak",
        ] {
            assert!(region_position_from_filename(Path::new(name)).is_none(), "{}", name);
        }
    }

    #[test]
    fn test_filename_round_trip() {
        let pos = RegionPosition::new(-7, 12);
        let name = region_position_filename(pos);

        assert_eq!(name, "r.-7.12.mca");
        assert_eq!(region_position_from_filename(Path::new(&name)), Some(pos));
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("regions");

        match FolderRegionProvider::new(&missing) {
            Err(ProviderError::MissingDirectory { path }) => assert_eq!(path, missing),
            Err(e) => panic!("Expected `MissingDirectory` but got `{:?}`", e),
            Ok(_) => panic!("Expected `MissingDirectory` but got a provider"),
        }
    }

    #[test]
    fn test_load_all_ignores_other_files() {
        let dir = TempDir::new().unwrap();

        let mut level = CompoundTag::new();
        level.insert("xPos", TagNode::Int(-1));
        level.insert("zPos", TagNode::Int(0));
        let mut root = CompoundTag::new();
        root.insert("Level", TagNode::Compound(level));

        let mut region = RegionFile::new(RegionPosition::new(-1, 0));
        region.insert_column(RegionChunkPosition::new(31, 0), root, 0);
        let mut file = fs::File::create(dir.path().join("r.-1.0.mca")).unwrap();
        region.write_to(&mut file).unwrap();
        drop(file);

        fs::write(dir.path().join("r.0.0.mca"), b"").unwrap();
        fs::write(dir.path().join("level.dat"), b"not a region").unwrap();
        fs::create_dir(dir.path().join("r.5.5.mca.d")).unwrap();

        let regions = FolderRegionProvider::new(dir.path())
            .unwrap()
            .load_all()
            .unwrap();

        assert_eq!(regions.len(), 2);
        assert!(regions.get(RegionPosition::new(0, 0)).unwrap().is_empty());
        assert!(regions.column(ChunkPosition::new(-1, 0)).is_some());
        assert!(regions.column(ChunkPosition::new(0, 0)).is_none());
        assert_eq!(regions.chunk_positions(), vec![ChunkPosition::new(-1, 0)]);
    }

    #[test]
    fn test_load_all_fails_on_truncated_header() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("r.0.0.mca"), vec![0u8; 10]).unwrap();

        match FolderRegionProvider::new(dir.path()).unwrap().load_all() {
            Err(ProviderError::RegionLoadError { .. }) => {}
            other => panic!("Expected `RegionLoadError` but got `{:?}`", other),
        }
    }
}
