use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::assembly::PinAssembly;
use crate::hex::Orientation;
use crate::region::Tolerance;
use crate::resolver::{OverlapPolicy, ResolverOptions};
use crate::scan::Grid;
use crate::surface::BoundaryCondition;

#[cfg(test)]
mod tests {

    use super::*;

    fn settings() -> Settings {
        load_default_config().unwrap()
    }

    #[test]
    fn default_config_loads() {
        let settings = settings();
        assert_eq!(settings.overlap_policy, OverlapPolicy::Warn);
        assert_eq!(settings.assembly, PinAssembly::default());
        assert_eq!(settings.census.resolution, 200);
        assert_eq!(settings.tolerance(), Tolerance::default());
    }

    #[test]
    fn assembly_overrides_apply() {
        let args = CliArgs::parse_from([
            "hexgeom",
            "--overlap-policy",
            "reject",
            "locate",
            "--num-rings",
            "2",
            "--orientation",
            "x",
            "1.0",
            "-2.0",
        ]);
        let mut settings = settings();
        args.apply(&mut settings);
        assert_eq!(settings.overlap_policy, OverlapPolicy::Reject);
        assert_eq!(settings.assembly.num_rings, 2);
        assert_eq!(settings.assembly.orientation, Orientation::X);
        match args.command {
            Command::Locate { y, z, .. } => {
                assert_eq!(y, -2.0);
                assert_eq!(z, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut bad = settings();
        bad.tie_tolerance = 0.0;
        assert!(validate_config(&bad).is_err());

        let mut bad = settings();
        bad.census.resolution = 0;
        assert!(validate_config(&bad).is_err());

        let mut bad = settings();
        bad.assembly.pin_radius = bad.assembly.pitch;
        assert!(validate_config(&bad).is_err());
    }
}

/// Runtime configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    /// Ray intersections at or closer than this are ignored.
    pub coincidence_tolerance: f64,
    /// Crossings closer together than this are treated as simultaneous.
    pub tie_tolerance: f64,
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub assembly: PinAssembly,
    pub census: Grid,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            coincidence: self.coincidence_tolerance,
            tie: self.tie_tolerance,
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            overlap_policy: self.overlap_policy,
            tolerance: self.tolerance(),
        }
    }
}

pub fn load_default_config() -> Result<Settings> {
    let root = retrieve_project_root()?;
    let default_config_file = root.join("config/default.toml");

    let config: Settings = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("loading default configuration")?
        .try_deserialize()
        .context("deserializing default configuration")?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the configuration file, then environment variables prefixed
/// `HEXGEOM_` (nested keys separated by `__`), then command-line overrides.
pub fn load_config(args: &CliArgs) -> Result<Settings> {
    let root = retrieve_project_root()?;

    let default_config_file = root.join("config/default.toml");
    let local_config = root.join("config/local.toml");

    // Check if local config exists, if not use default
    let config_file = if local_config.exists() {
        local_config
    } else {
        default_config_file
    };

    let mut config: Settings = Config::builder()
        .add_source(File::from(config_file.clone()).required(true))
        .add_source(
            Environment::with_prefix("hexgeom")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("loading configuration from {:?}", config_file))?
        .try_deserialize()
        .with_context(|| format!("deserializing configuration from {:?}", config_file))?;

    args.apply(&mut config);

    validate_config(&config)?;

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the HEXGEOM_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
pub fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        // When running through cargo (e.g. cargo run, cargo test)
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("HEXGEOM_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }

    let exe_path = env::current_exe().context("locating the current executable")?;
    let mut current_dir = exe_path.parent();
    while let Some(dir) = current_dir {
        if dir.join("config").is_dir() {
            return Ok(dir.to_path_buf());
        }
        current_dir = dir.parent();
    }
    anyhow::bail!(
        "could not find a directory containing config/ above {:?}; set HEXGEOM_ROOT_DIR",
        exe_path
    )
}

pub fn validate_config(config: &Settings) -> Result<()> {
    ensure!(
        config.coincidence_tolerance > 0.0,
        "coincidence tolerance must be greater than 0"
    );
    ensure!(
        config.tie_tolerance > 0.0,
        "tie tolerance must be greater than 0"
    );
    let assembly = &config.assembly;
    ensure!(assembly.num_rings > 0, "assembly needs at least one ring");
    ensure!(assembly.pitch > 0.0, "assembly pitch must be greater than 0");
    ensure!(
        assembly.pin_radius > 0.0 && assembly.pin_radius < 0.5 * assembly.pitch,
        "pin radius must lie in (0, pitch / 2)"
    );
    ensure!(config.census.resolution > 0, "census resolution must be at least 1");
    ensure!(
        config.census.half_width > 0.0,
        "census half width must be greater than 0"
    );
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about = "hexgeom - CSG point location in hexagonal lattice geometries")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// How cells overlapping within a universe are handled.
    #[arg(long, value_enum, global = true)]
    pub overlap_policy: Option<OverlapPolicy>,

    /// Log filter used when RUST_LOG is not set, e.g. "debug" or "hexgeom=trace".
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print the effective configuration as TOML before running.
    #[arg(long, global = true)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the (ring, position) layout of a hexagonal lattice.
    Indices {
        #[arg(long, default_value_t = 4)]
        rings: usize,
        #[arg(long, value_enum, default_value_t = Orientation::Y)]
        orientation: Orientation,
    },

    /// Locate a point in the configured pin assembly.
    #[command(allow_negative_numbers = true)]
    Locate {
        x: f64,
        y: f64,
        z: Option<f64>,
        #[command(flatten)]
        assembly: AssemblyArgs,
    },

    /// Follow a ray through the configured pin assembly, printing each segment.
    #[command(allow_negative_numbers = true)]
    Trace {
        x: f64,
        y: f64,
        z: f64,
        u: f64,
        v: f64,
        w: f64,
        /// The maximum number of segments before the trace is truncated.
        #[arg(long, default_value_t = 100)]
        max_segments: usize,
        #[command(flatten)]
        assembly: AssemblyArgs,
    },

    /// Tally the occupants of a grid of points and audit cell overlaps.
    Census {
        /// Samples along each side of the grid.
        #[arg(long)]
        resolution: Option<usize>,
        /// Half the side length of the grid.
        #[arg(long)]
        half_width: Option<f64>,
        /// Height of the sampled plane.
        #[arg(long, allow_negative_numbers = true)]
        z: Option<f64>,
        /// Skip the overlap audit.
        #[arg(long)]
        no_audit: bool,
        #[command(flatten)]
        assembly: AssemblyArgs,
    },
}

/// Overrides for the `[assembly]` table.
#[derive(Args, Debug, Clone, Default)]
pub struct AssemblyArgs {
    /// Number of rings, counting the centre pin as one ring.
    #[arg(long)]
    pub num_rings: Option<usize>,

    #[arg(long, value_enum)]
    pub orientation: Option<Orientation>,

    /// Distance between neighbouring pin centres.
    #[arg(long)]
    pub pitch: Option<f64>,

    #[arg(long)]
    pub pin_radius: Option<f64>,

    /// Condition on the assembly walls.
    #[arg(long, value_enum)]
    pub boundary: Option<BoundaryCondition>,
}

impl AssemblyArgs {
    fn apply(&self, assembly: &mut PinAssembly) {
        if let Some(num_rings) = self.num_rings {
            assembly.num_rings = num_rings;
        }
        if let Some(orientation) = self.orientation {
            assembly.orientation = orientation;
        }
        if let Some(pitch) = self.pitch {
            assembly.pitch = pitch;
        }
        if let Some(pin_radius) = self.pin_radius {
            assembly.pin_radius = pin_radius;
        }
        if let Some(boundary) = self.boundary {
            assembly.boundary = boundary;
        }
    }
}

impl CliArgs {
    /// Overrides configuration values with those given on the command line.
    pub fn apply(&self, config: &mut Settings) {
        if let Some(policy) = self.overlap_policy {
            config.overlap_policy = policy;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        match &self.command {
            Command::Indices { .. } => {}
            Command::Locate { assembly, .. } | Command::Trace { assembly, .. } => {
                assembly.apply(&mut config.assembly)
            }
            Command::Census {
                resolution,
                half_width,
                z,
                assembly,
                ..
            } => {
                assembly.apply(&mut config.assembly);
                if let Some(resolution) = resolution {
                    config.census.resolution = *resolution;
                }
                if let Some(half_width) = half_width {
                    config.census.half_width = *half_width;
                }
                if let Some(z) = z {
                    config.census.z = *z;
                }
            }
        }
    }
}
