//! Pairing lifecycle and platform tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection phase between the primary device and its companion.
///
/// Only `Connected` lets the monitor loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// No companion paired.
    #[default]
    Disconnected,
    /// Pairing requested, waiting for the handshake to complete.
    Searching,
    /// Paired and monitoring.
    Connected,
}

impl ConnectionPhase {
    /// Check if the monitor loop may run in this phase.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "Disconnected",
            Self::Searching => "Searching...",
            Self::Connected => "Connected",
        };
        f.write_str(label)
    }
}

/// Platform family of the paired primary device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Apple iOS.
    Ios,
    /// Google Android.
    Android,
    /// Not yet known.
    #[default]
    Unknown,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}
