//! # tracker-keeper
//!
//! Terminal front end for the Tracker Keeper proximity monitor.
//!
//! ## Commands
//!
//! - `monitor`: Pair with a (simulated) companion and watch its distance
//! - `devices`: Scan for pairable devices
//! - `distance`: Great-circle distance between two coordinates
//! - `config`: Print the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # Watch an Android pairing with a 30m fence, sampling every 15 seconds
//! tracker-keeper monitor --platform android --max-range 30 --interval 0.25
//!
//! # Distance between two points
//! tracker-keeper distance 40.7128 -74.0060 40.7133 -74.0055 --max-range 50
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keeper_types::{Coordinate, Platform};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{devices, distance, monitor};
use config::{Config, ProviderKind};

/// Terminal front end for the Tracker Keeper proximity monitor.
#[derive(Parser, Debug)]
#[command(name = "tracker-keeper")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./tracker-keeper.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pair with a device and monitor its distance
    Monitor {
        /// Device platform
        #[arg(long, short)]
        platform: Option<Platform>,

        /// Guess the platform from a user agent string
        #[arg(long, conflicts_with = "platform")]
        user_agent: Option<String>,

        /// Device name (default: first device found by a scan)
        #[arg(long, short)]
        device: Option<String>,

        /// Maximum range in meters
        #[arg(long)]
        max_range: Option<f64>,

        /// Update interval in minutes (fractions allowed)
        #[arg(long)]
        interval: Option<f64>,

        /// Companion drift in degrees
        #[arg(long)]
        drift: Option<f64>,

        /// Seed for reproducible companion drift
        #[arg(long)]
        seed: Option<u64>,

        /// Use a fixed primary position instead of the location command
        #[arg(long, num_args = 2, value_names = ["LAT", "LON"], allow_negative_numbers = true)]
        fixed: Option<Vec<f64>>,

        /// Print JSON snapshots instead of status lines
        #[arg(long)]
        json: bool,

        /// Stop after this many samples
        #[arg(long)]
        samples: Option<usize>,

        /// Do not read commands from stdin
        #[arg(long)]
        no_input: bool,
    },

    /// Scan for pairable devices
    Devices {
        /// Device platform
        #[arg(long, short)]
        platform: Option<Platform>,

        /// Guess the platform from a user agent string
        #[arg(long, conflicts_with = "platform")]
        user_agent: Option<String>,
    },

    /// Distance between two coordinates
    Distance {
        /// Latitude of the first point
        #[arg(allow_negative_numbers = true)]
        from_lat: f64,
        /// Longitude of the first point
        #[arg(allow_negative_numbers = true)]
        from_lon: f64,
        /// Latitude of the second point
        #[arg(allow_negative_numbers = true)]
        to_lat: f64,
        /// Longitude of the second point
        #[arg(allow_negative_numbers = true)]
        to_lon: f64,

        /// Report whether the points are within this range
        #[arg(long)]
        max_range: Option<f64>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Monitor {
            platform,
            user_agent,
            device,
            max_range,
            interval,
            drift,
            seed,
            fixed,
            json,
            samples,
            no_input,
        } => {
            // Flags override the file
            if let Some(meters) = max_range {
                config.monitoring.max_range_meters = meters;
            }
            if let Some(minutes) = interval {
                config.monitoring.update_interval_minutes = minutes;
            }
            if let Some(drift) = drift {
                config.simulation.drift_magnitude = drift;
            }
            if seed.is_some() {
                config.simulation.seed = seed;
            }
            if let Some([lat, lon]) = fixed.as_deref() {
                config.location.provider = ProviderKind::Fixed;
                config.location.latitude = *lat;
                config.location.longitude = *lon;
            }

            let options = monitor::MonitorOptions {
                platform: devices::resolve_platform(platform, user_agent.as_deref()),
                device,
                json,
                samples,
                interactive: !no_input,
            };
            monitor::run(config, options).await?;
        }
        Commands::Devices {
            platform,
            user_agent,
        } => {
            devices::run(devices::resolve_platform(platform, user_agent.as_deref())).await?;
        }
        Commands::Distance {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
            max_range,
        } => {
            let max_range = max_range.or(Some(config.monitoring.max_range_meters));
            distance::run(
                Coordinate::new(from_lat, from_lon),
                Coordinate::new(to_lat, to_lon),
                max_range,
            )?;
        }
        Commands::Config => {
            commands::config::run(&config)?;
        }
    }

    Ok(())
}
