use anvil_convert::config::{init_logging, Args};
use anvil_convert::{
    requested_chunks, BiomeTable, BlockRegistry, ChunkConverter, ConversionRun, FolderChunkStore,
    FolderRegionProvider, RegionSet, RunSummary,
};
use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(&args) {
        Ok(summary) => {
            let stats = summary.stats();
            info!(
                target: "anvil-convert",
                "{} chunks completed ({} placeholders), {} failed; {} voxels written, {} skipped",
                summary.completed(),
                summary.placeholders(),
                summary.failed(),
                stats.written,
                stats.skipped
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(target: "anvil-convert", "{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunSummary, Box<dyn Error>> {
    let regions = load_regions(args)?;
    let registry = BlockRegistry::load(&args.registry)?;
    info!(
        target: "anvil-convert",
        "Loaded {} blocks from {}",
        registry.len(),
        args.registry.display()
    );

    let chunks = requested_chunks(args.range, &regions);
    let converter = ChunkConverter::new(
        Arc::new(regions),
        Arc::new(registry),
        Arc::new(BiomeTable::vanilla()),
    );
    let store = FolderChunkStore::new(&args.output);

    let summary = ConversionRun::new(Arc::new(converter), Arc::new(store))
        .threads(args.threads())
        .run(&chunks)?;

    Ok(summary)
}

#[cfg(feature = "zip")]
fn load_regions(args: &Args) -> Result<RegionSet, Box<dyn Error>> {
    use anvil_convert::ZipRegionProvider;

    match &args.zip {
        Some(path) => Ok(ZipRegionProvider::file(path)?.load_all()?),
        None => Ok(FolderRegionProvider::new(&args.input)?.load_all()?),
    }
}

#[cfg(not(feature = "zip"))]
fn load_regions(args: &Args) -> Result<RegionSet, Box<dyn Error>> {
    Ok(FolderRegionProvider::new(&args.input)?.load_all()?)
}
