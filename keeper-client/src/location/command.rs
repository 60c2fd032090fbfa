//! Location provider backed by an external location command.
//!
//! The default command is `termux-location`, which prints one JSON object
//! per fix:
//!
//! ```text
//! {"latitude": 40.71, "longitude": -74.00, "altitude": 12.3, "accuracy": 8.0, ...}
//! ```

use super::{LocationError, LocationProvider, PositionOptions};
use async_trait::async_trait;
use keeper_types::Coordinate;
use serde::Deserialize;
use std::io::ErrorKind;
use tokio::process::Command;

/// Default location command.
pub const DEFAULT_LOCATION_COMMAND: &str = "termux-location";

/// Location provider that shells out to a location command.
#[derive(Debug, Clone)]
pub struct CommandLocation {
    program: String,
    args: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CommandReading {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    altitude: Option<f64>,
    #[serde(default)]
    accuracy: Option<f64>,
}

impl Default for CommandLocation {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATION_COMMAND)
    }
}

impl CommandLocation {
    /// Use `program` with termux-style arguments (`-p gps|network -r once`).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: None,
        }
    }

    /// Use `program` with exactly `args`, ignoring the accuracy hint.
    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: Some(args.into_iter().map(Into::into).collect()),
        }
    }

    /// Program this provider runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn build_args(&self, options: &PositionOptions) -> Vec<String> {
        match &self.args {
            Some(args) => args.clone(),
            None => {
                let provider = if options.high_accuracy { "gps" } else { "network" };
                vec![
                    "-p".to_string(),
                    provider.to_string(),
                    "-r".to_string(),
                    "once".to_string(),
                ]
            }
        }
    }
}

#[async_trait]
impl LocationProvider for CommandLocation {
    async fn locate(&self, options: &PositionOptions) -> Result<Coordinate, LocationError> {
        let output = Command::new(&self.program)
            .args(self.build_args(options))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => LocationError::Unsupported,
                ErrorKind::PermissionDenied => LocationError::PermissionDenied,
                _ => LocationError::Internal(format!("{}: {}", self.program, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_ascii_lowercase().contains("permission") {
                return Err(LocationError::PermissionDenied);
            }
            return Err(LocationError::PositionUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        parse_reading(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the JSON printed by the location command.
fn parse_reading(stdout: &str) -> Result<Coordinate, LocationError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(LocationError::PositionUnavailable("no fix reported".into()));
    }

    let reading: CommandReading = serde_json::from_str(trimmed)
        .map_err(|e| LocationError::PositionUnavailable(format!("malformed reading: {e}")))?;

    Ok(Coordinate {
        latitude: reading.latitude,
        longitude: reading.longitude,
        altitude: reading.altitude,
        accuracy: reading.accuracy,
    })
}
