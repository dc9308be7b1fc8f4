//! Command-line arguments and logging setup for the converter binary.

use clap::Parser;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Converts Anvil region files into one chunk file per chunk.
#[derive(Parser, Debug)]
#[command(name = "anvil-convert", version, about)]
pub struct Args {
    /// Folder holding the `r.<x>.<z>.mca` region files.
    #[arg(long, default_value = "regions")]
    pub input: PathBuf,

    /// Folder receiving the converted chunks and the manifest.
    #[arg(long, default_value = "chunks")]
    pub output: PathBuf,

    /// `blocks.json` report of the vanilla data generator.
    #[arg(long)]
    pub registry: PathBuf,

    /// Convert every chunk with `-range <= x, z < range` instead of every
    /// present column.
    #[arg(long)]
    pub range: Option<u32>,

    /// Worker threads, one per logical CPU by default.
    #[arg(long)]
    pub threads: Option<NonZeroUsize>,

    /// Read regions from the `region/` folder of a world archive instead of
    /// `--input`.
    #[cfg(feature = "zip")]
    #[arg(long)]
    pub zip: Option<PathBuf>,
}

impl Args {
    pub fn threads(&self) -> Option<usize> {
        self.threads.map(NonZeroUsize::get)
    }
}

/// Installs `env_logger`, `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(&["anvil-convert", "--registry", "blocks.json"]).unwrap();

        assert_eq!(args.input, PathBuf::from("regions"));
        assert_eq!(args.output, PathBuf::from("chunks"));
        assert_eq!(args.registry, PathBuf::from("blocks.json"));
        assert_eq!(args.range, None);
        assert_eq!(args.threads(), None);
    }

    #[test]
    fn test_all_arguments() {
        let args = Args::try_parse_from(&[
            "anvil-convert",
            "--input",
            "world/region",
            "--output",
            "out",
            "--registry",
            "reports/blocks.json",
            "--range",
            "8",
            "--threads",
            "3",
        ])
        .unwrap();

        assert_eq!(args.input, PathBuf::from("world/region"));
        assert_eq!(args.range, Some(8));
        assert_eq!(args.threads(), Some(3));
    }

    #[test]
    fn test_registry_is_required() {
        let error = Args::try_parse_from(&["anvil-convert", "--range", "4"]).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        for arguments in &[
            ["anvil-convert", "--registry", "b.json", "--range", "-1"],
            ["anvil-convert", "--registry", "b.json", "--threads", "0"],
        ] {
            assert!(Args::try_parse_from(arguments).is_err());
        }
    }
}
