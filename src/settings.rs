use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bbox::{Axis, BoundingBox};


/// Tolerance for two coordinates to be considered coincident, and for a
/// point to be considered on a surface.
pub const FP_COINCIDENT: f64 = 1e-12;
/// Universes with at least this many cells get a partitioner by default.
pub const DEFAULT_PARTITION_THRESHOLD: usize = 10;

/// Runtime configuration for the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Path to the TOML geometry description.
    pub geometry: PathBuf,
    /// Axis stratified by the universe partitioners.
    #[serde(default)]
    pub axis: Axis,
    #[serde(default = "default_partition_threshold")]
    pub partition_threshold: usize,
    /// Number of random points sampled by the survey.
    pub samples: usize,
    pub seed: Option<u64>,
    /// Repeat every search without partitioners and compare.
    #[serde(default = "default_verify")]
    pub verify: bool,
    /// Sampling box, required if the root universe is unbounded.
    pub bounds: Option<BoundingBox>,
    /// Output directory.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

fn default_partition_threshold() -> usize {
    DEFAULT_PARTITION_THRESHOLD
}

fn default_verify() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from("output")
}

/// Loads `config/default.toml` only, ignoring local overrides, the
/// environment and the command line.
pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let settings = Config::builder()
        .add_source(File::from(default_config_file.as_path()).required(true))
        .build()
        .with_context(|| format!("loading configuration {:?}", default_config_file))?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("deserializing configuration")?;
    resolve_geometry_path(&mut config, &root);

    validate_config(&config)?;

    Ok(config)
}

/// Loads the configuration, then applies environment and command line
/// overrides.
pub fn load_config() -> Result<Settings> {
    load_config_with(&CliArgs::parse())
}

/// Same as [`load_config`] with already parsed command line arguments.
pub fn load_config_with(args: &CliArgs) -> Result<Settings> {
    let root = retrieve_project_root()?;

    let config_file = match &args.config {
        Some(path) => path.clone(),
        None => {
            let default_config_file = root.join("config/default.toml");
            let local_config = root.join("config/local.toml");
            // Check if local config exists, if not use default
            if local_config.exists() {
                local_config
            } else {
                default_config_file
            }
        }
    };
    info!("using configuration {:?}", config_file);

    let settings = Config::builder()
        .add_source(File::from(config_file.as_path()).required(true))
        .add_source(Environment::with_prefix("unipart"))
        .build()
        .with_context(|| format!("loading configuration {:?}", config_file))?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("deserializing configuration")?;

    apply_overrides(&mut config, args);
    resolve_geometry_path(&mut config, &root);

    validate_config(&config)?;

    Ok(config)
}

fn apply_overrides(config: &mut Settings, args: &CliArgs) {
    if let Some(geo) = &args.geo {
        config.geometry = geo.clone();
    }
    if let Some(axis) = args.axis {
        config.axis = axis;
    }
    if let Some(threshold) = args.threshold {
        config.partition_threshold = threshold;
    }
    if let Some(samples) = args.samples {
        config.samples = samples;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if args.no_verify {
        config.verify = false;
    }
    if let Some(dir) = &args.dir {
        config.directory = dir.clone();
    }
}

/// Relative geometry paths that do not exist from the working directory are
/// taken relative to the project root.
fn resolve_geometry_path(config: &mut Settings, root: &Path) {
    if config.geometry.is_relative() && !config.geometry.exists() {
        config.geometry = root.join(&config.geometry);
    }
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the UNIPART_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("UNIPART_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("could not find project root directory from {:?}", exe_path))
}

pub fn validate_config(config: &Settings) -> Result<()> {
    if config.samples == 0 {
        bail!("number of samples must be greater than 0");
    }
    if let Some(bounds) = &config.bounds {
        if bounds.is_empty() || !bounds.is_finite() {
            bail!("sampling bounds must be finite and non-empty, got {}", bounds);
        }
    }
    Ok(())
}

#[derive(Parser, Debug, Default)]
#[command(version, about = "Survey cell searches in a CSG geometry with and without universe partitioners")]
pub struct CliArgs {
    /// Configuration file to use instead of config/default.toml or config/local.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File path to the TOML geometry description.
    #[arg(short, long)]
    geo: Option<PathBuf>,

    /// Axis stratified by the partitioners (x, y or z).
    #[arg(long)]
    axis: Option<Axis>,

    /// Minimum number of cells for a universe to be partitioned.
    #[arg(long)]
    threshold: Option<usize>,

    /// Number of random points to sample.
    #[arg(short = 'n', long)]
    samples: Option<usize>,

    /// Random seed for the survey.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Skip the comparison against searches without partitioners.
    #[arg(long)]
    no_verify: bool,

    /// Output directory.
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Geometry: {}
  - Partition Axis: {}
  - Partition Threshold: {}
  - Samples: {}
  - Seed: {:?}
  - Verify: {}
  ",
            self.geometry.display(),
            self.axis,
            self.partition_threshold,
            self.samples,
            self.seed,
            self.verify,
        )
    }
}
