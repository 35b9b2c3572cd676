use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use imtrail::{expand_paths, ImagePaths, Locator, DEFAULT_SIZE, DEFAULT_ZOOM};

/// Put photos on a timeline and a map using their GPS tags
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Image files or directories to read
    paths: Vec<PathBuf>,
    /// Google Maps API key
    #[arg(short = 'k', long, env = "GOOGLE_MAPS_API_KEY", default_value_t = String::new())]
    api_key: String,
    /// Map zoom level
    #[arg(short, long, default_value_t = DEFAULT_ZOOM)]
    zoom: u32,
    /// Map size in pixels, WIDTHxHEIGHT
    #[arg(short, long, default_value_t = String::from(DEFAULT_SIZE))]
    size: String,
    /// Print a static map URL instead of the locations
    #[arg(short, long, action)]
    map: bool,
    /// Skip reverse geocoding
    #[arg(long, action)]
    no_geocode: bool,
    #[arg(short, long, action)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let paths = expand_paths(&args.paths).context("Error walking image directories")?;
    let image_paths = if paths.is_empty() {
        None
    } else {
        Some(ImagePaths::Many(paths))
    };

    let mut locator = Locator::new(&args.api_key, image_paths, args.zoom, &args.size)
        .context("Invalid map options")?;
    if args.no_geocode {
        locator = locator.without_geocoding();
    }

    let Some(batch) = locator.batch() else {
        eprintln!("No images given");
        return Ok(());
    };
    eprintln!(
        "Found {} locations, skipped {} images",
        batch.locations.len(),
        batch.skipped.len()
    );
    if batch.geocode_failures > 0 {
        eprintln!("{} locations have no address", batch.geocode_failures);
    }

    if args.map {
        println!("{}", locator.map_url(&batch.locations));
    } else {
        let json = serde_json::to_string_pretty(&batch.locations)
            .context("Error serializing locations")?;
        println!("{}", json);
    }
    Ok(())
}
