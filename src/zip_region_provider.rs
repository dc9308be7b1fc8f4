use crate::error::RegionLoadError;
use crate::position::RegionPosition;
use crate::provider::{region_position_from_filename, RegionSet};
use crate::region::RegionFile;
use log::{debug, info};
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

pub use zip::result::ZipError;

/// Upper bound for the buffer reserved from the size an archive entry declares.
const PREALLOCATE_LIMIT: usize = 16 * 1024 * 1024;

fn initial_capacity(declared_size: u64) -> usize {
    declared_size.min(PREALLOCATE_LIMIT as u64) as usize
}

/// Region files are read from a world archive.
#[derive(Debug)]
pub struct ZipRegionProvider<R: Read + Seek> {
    zip_archive: ZipArchive<R>,
    /// Path of the region folder inside the archive, ending with "/".
    /// For example: "region/", "world/region/" or "saves/world/region/".
    region_prefix: String,
}

#[derive(Debug)]
pub enum ZipProviderError {
    IOError { io_error: io::Error },
    ZipError { zip_error: ZipError },
    RegionFolderNotFound,
    MoreThanOneRegionFolder,
    /// Region file inside the archive could not be loaded.
    RegionLoadError {
        name: String,
        region_load_error: RegionLoadError,
    },
}

impl From<io::Error> for ZipProviderError {
    fn from(io_error: io::Error) -> Self {
        ZipProviderError::IOError { io_error }
    }
}

impl From<ZipError> for ZipProviderError {
    fn from(zip_error: ZipError) -> Self {
        ZipProviderError::ZipError { zip_error }
    }
}

impl std::error::Error for ZipProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZipProviderError::IOError { io_error } => Some(io_error),
            ZipProviderError::ZipError { zip_error } => Some(zip_error),
            ZipProviderError::RegionLoadError {
                region_load_error, ..
            } => Some(region_load_error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ZipProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ZipProviderError::*;
        match self {
            IOError { io_error } => write!(f, "IO Error: {}", io_error),
            ZipError { zip_error } => write!(f, "Zip Error: {}", zip_error),
            RegionFolderNotFound => write!(f, "Archive has no region folder"),
            MoreThanOneRegionFolder => write!(f, "Archive has more than one region folder"),
            RegionLoadError {
                name,
                region_load_error,
            } => write!(f, "Failed to load {}: {}", name, region_load_error),
        }
    }
}

// Find the path of the region folder inside the zip archive.
// Exactly one folder named "region" must exist.
fn find_region_folder_path<R: Read + Seek>(
    zip_archive: &mut ZipArchive<R>,
) -> Result<String, ZipProviderError> {
    let mut region_prefix = None;
    let mut found_region_count = 0;

    for i in 0..zip_archive.len() {
        let file = zip_archive.by_index(i)?;

        if !file.is_dir() {
            continue;
        }

        let is_region_folder = file
            .enclosed_name()
            .map_or(false, |path| path.file_name() == Some(OsStr::new("region")));

        if is_region_folder {
            found_region_count += 1;
            region_prefix = Some(file.name().to_string());
        }
    }

    match (found_region_count, region_prefix) {
        (1, Some(prefix)) => Ok(prefix),
        (0, _) => Err(ZipProviderError::RegionFolderNotFound),
        _ => Err(ZipProviderError::MoreThanOneRegionFolder),
    }
}

impl<R: Read + Seek> ZipRegionProvider<R> {
    pub fn new(reader: R) -> Result<Self, ZipProviderError> {
        let mut zip_archive = ZipArchive::new(reader)?;
        let region_prefix = find_region_folder_path(&mut zip_archive)?;

        Ok(ZipRegionProvider {
            zip_archive,
            region_prefix,
        })
    }

    pub fn region_prefix(&self) -> &str {
        &self.region_prefix
    }

    /// Archive entries directly inside the region folder which are named like
    /// region files.
    pub fn region_names(&self) -> Vec<(RegionPosition, String)> {
        let mut names: Vec<_> = self
            .zip_archive
            .file_names()
            .filter_map(|name| {
                let file_name = name.strip_prefix(self.region_prefix.as_str())?;

                if file_name.contains('/') {
                    return None;
                }

                region_position_from_filename(Path::new(file_name))
                    .map(|position| (position, name.to_string()))
            })
            .collect();

        names.sort();
        names
    }

    /// Decompresses and decodes every region file of the archive.
    pub fn load_all(&mut self) -> Result<RegionSet, ZipProviderError> {
        let mut regions = RegionSet::new();

        for (position, name) in self.region_names() {
            debug!(target: "anvil-convert", "Loading region {} from archive entry {}", position, name);

            let mut region_file = self.zip_archive.by_name(&name)?;
            let mut buf = Vec::with_capacity(initial_capacity(region_file.size()));
            region_file.read_to_end(&mut buf)?;

            let region = RegionFile::from_bytes(position, &buf).map_err(|region_load_error| {
                ZipProviderError::RegionLoadError {
                    name: name.clone(),
                    region_load_error,
                }
            })?;

            regions.insert(region);
        }

        info!(
            target: "anvil-convert",
            "Loaded {} regions from archive folder {}",
            regions.len(),
            self.region_prefix
        );

        Ok(regions)
    }
}

impl ZipRegionProvider<File> {
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self, ZipProviderError> {
        let file = File::open(path)?;

        Self::new(file)
    }
}
