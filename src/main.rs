extern crate log;
pub mod conflate;
pub mod crs;
pub mod error;
pub mod geofile;
pub mod osm;
pub mod similarity;
use crate::conflate::{conflate, ConflateParams, ConflationResult};
use crate::error::DatasetRole;
use crate::geofile::feature::Feature;
use crate::geofile::geojson::write_features_to_geojson;
use crate::geofile::read_features;
use crate::osm::writer::write_features_to_osm_file;
use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

const DEFAULT_OUTFILE: &str = "conflated.geojson";

/// Conflate a road dataset with existing OpenStreetMap data.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: Option<PathBuf>,

    /// Primary dataset (.geojson or .osm), the data to import.
    #[arg(short, long)]
    primary: Option<PathBuf>,

    /// Secondary dataset (.geojson or .osm), usually existing OSM data.
    #[arg(short, long)]
    secondary: Option<PathBuf>,

    /// Output file, the written files are named after its stem.
    #[arg(short, long)]
    outfile: Option<PathBuf>,

    /// Distance threshold in meters.
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Number of worker threads.
    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize, Debug, Default)]
struct Config {
    primary_filepath: Option<PathBuf>,
    secondary_filepath: Option<PathBuf>,
    output_filepath: Option<PathBuf>,
    #[serde(default)]
    params: ConflateParams,
}

/// Everything a run needs, with command line arguments taking precedence over the config file.
#[derive(Debug)]
struct RunSettings {
    primary_filepath: PathBuf,
    secondary_filepath: PathBuf,
    output_filepath: PathBuf,
    params: ConflateParams,
}

struct OutputPaths {
    osm: PathBuf,
    merged: PathBuf,
    new: PathBuf,
}

fn init_logging(verbose: bool) {
    if verbose {
        std::env::set_var("RUST_LOG", "debug")
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
}

fn load_config(config_filepath: &Path) -> anyhow::Result<Config> {
    if !config_filepath.exists() {
        return Err(anyhow!("Config file {:?} not found", config_filepath));
    }
    let config_contents = read_to_string(config_filepath)?;
    serde_yaml::from_str(&config_contents)
        .with_context(|| format!("Parsing config file {:?}", config_filepath))
}

fn resolve_settings(args: Args) -> anyhow::Result<RunSettings> {
    let config = match &args.config_filepath {
        Some(config_filepath) => load_config(config_filepath)?,
        None => Config::default(),
    };

    let primary_filepath = args
        .primary
        .or(config.primary_filepath)
        .ok_or_else(|| anyhow!("No primary dataset, use --primary or primary_filepath"))?;
    let secondary_filepath = args
        .secondary
        .or(config.secondary_filepath)
        .ok_or_else(|| anyhow!("No secondary dataset, use --secondary or secondary_filepath"))?;
    let output_filepath = args
        .outfile
        .or(config.output_filepath)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTFILE));

    let mut params = config.params;
    if let Some(threshold) = args.threshold {
        params.distance_threshold = threshold;
    }
    if let Some(workers) = args.workers {
        params.workers = workers;
    }

    Ok(RunSettings {
        primary_filepath,
        secondary_filepath,
        output_filepath,
        params,
    })
}

fn output_paths(output_filepath: &Path) -> OutputPaths {
    let stem = output_filepath
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("conflated");
    let dir = output_filepath.parent().unwrap_or_else(|| Path::new(""));
    OutputPaths {
        osm: dir.join(format!("{}-out.osm", stem)),
        merged: dir.join(format!("{}-out.geojson", stem)),
        new: dir.join(format!("{}-new.geojson", stem)),
    }
}

fn read_dataset(filepath: &Path, role: DatasetRole) -> anyhow::Result<Vec<Feature>> {
    let features = read_features(filepath)?;
    if features.is_empty() {
        return Err(anyhow!(
            "The {} dataset {:?} has no features",
            role,
            filepath
        ));
    }
    log::info!(
        "Read {} {} features from {:?}",
        features.len(),
        role,
        filepath
    );
    Ok(features)
}

fn log_summary(result: &ConflationResult) {
    log::info!(
        "Merged: {}, new: {}, dropped: {}, skipped: {}, failed: {}",
        result.merged.len(),
        result.new.len(),
        result.dropped,
        result.skipped,
        result.failures.len()
    );
    for failure in &result.failures {
        log::error!(
            "Primary feature {} failed: {}",
            failure.index,
            failure.reason
        );
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let settings = resolve_settings(args)?;
    log::debug!("{:?}", settings);

    let primary = read_dataset(&settings.primary_filepath, DatasetRole::Primary)?;
    let secondary = read_dataset(&settings.secondary_filepath, DatasetRole::Secondary)?;

    let result = conflate(&primary, &secondary, &settings.params)?;
    log_summary(&result);

    let output_paths = output_paths(&settings.output_filepath);
    let written = write_features_to_osm_file(&result.merged, &output_paths.osm)?;
    log::info!("Wrote {} ways to {:?}", written, output_paths.osm);
    write_features_to_geojson(&result.merged, &output_paths.merged)?;
    log::info!(
        "Wrote {} merged features to {:?}",
        result.merged.len(),
        output_paths.merged
    );
    write_features_to_geojson(&result.new, &output_paths.new)?;
    log::info!(
        "Wrote {} new features to {:?}",
        result.new.len(),
        output_paths.new
    );
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
