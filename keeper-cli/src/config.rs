//! Configuration loading for tracker-keeper.
//!
//! Configuration is loaded from a TOML file (default: `tracker-keeper.toml`
//! in the working directory, if present). Every field has a default, so an
//! empty file is a valid configuration.

use std::path::{Path, PathBuf};

use keeper_client::{
    CommandLocation, FixedLocation, LocationProvider, PositionSource, DEFAULT_LOCATION_COMMAND,
};
use keeper_types::{Coordinate, MonitoringConfig, DEFAULT_DRIFT_MAGNITUDE};
use serde::{Deserialize, Serialize};

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tracker-keeper.toml";

/// Root configuration for tracker-keeper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Monitoring settings.
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Companion simulation.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Where the primary position comes from.
    #[serde(default)]
    pub location: LocationConfig,
}

/// Companion simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Spread of the companion position in degrees (default: 0.0001).
    #[serde(default = "default_drift")]
    pub drift_magnitude: f64,
    /// Seed for reproducible runs (default: OS entropy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Kind of location provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// External location command.
    #[default]
    Command,
    /// Fixed coordinate from this file.
    Fixed,
    /// No location capability; always the fallback coordinate.
    None,
}

/// Location provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Provider kind (default: command).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Location command (default: termux-location).
    #[serde(default = "default_command")]
    pub command: String,
    /// Explicit command arguments, replacing the built-in ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Latitude for the fixed provider.
    #[serde(default)]
    pub latitude: f64,
    /// Longitude for the fixed provider.
    #[serde(default)]
    pub longitude: f64,
    /// Altitude for the fixed provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

// Default value functions
fn default_drift() -> f64 {
    DEFAULT_DRIFT_MAGNITUDE
}

fn default_command() -> String {
    DEFAULT_LOCATION_COMMAND.to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            drift_magnitude: default_drift(),
            seed: None,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            command: default_command(),
            args: None,
            latitude: 0.0,
            longitude: 0.0,
            altitude: None,
        }
    }
}

impl LocationConfig {
    /// Build the position source described by this section.
    pub fn position_source(&self) -> PositionSource<Box<dyn LocationProvider>> {
        let provider: Box<dyn LocationProvider> = match self.provider {
            ProviderKind::None => return PositionSource::unsupported(),
            ProviderKind::Fixed => {
                let mut here = Coordinate::new(self.latitude, self.longitude);
                here.altitude = self.altitude;
                Box::new(FixedLocation::new(here))
            }
            ProviderKind::Command => match &self.args {
                Some(args) => Box::new(CommandLocation::with_args(&self.command, args.clone())),
                None => Box::new(CommandLocation::new(&self.command)),
            },
        };
        PositionSource::new(provider)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path`, or the default file if present, or built-in defaults.
    ///
    /// An explicitly given path must exist. The default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
