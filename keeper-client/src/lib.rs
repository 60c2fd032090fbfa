//! # keeper-client
//!
//! Async monitoring runtime for the Tracker Keeper proximity monitor.
//!
//! This is the main library that front ends use to pair a simulated
//! companion watch and watch its distance from the primary device.
//!
//! ## Features
//!
//! - **Location Abstraction**: Pluggable location providers (command, fixed, mock)
//! - **No-Fail Positioning**: Timeouts and provider errors resolve to a fallback coordinate
//! - **Owned Timer**: One cancellable sampling task, re-armed on every reconfiguration
//! - **Pure State Machine**: Uses keeper-core for side-effect-free session logic
//!
//! ## Example
//!
//! ```ignore
//! use keeper_client::{FixedLocation, PositionSource, Tracker};
//! use keeper_core::RngSource;
//! use keeper_types::{Coordinate, MonitoringConfig, Platform};
//!
//! let source = PositionSource::new(FixedLocation::new(Coordinate::new(51.5, -0.12)));
//! let tracker = Tracker::new(source, RngSource::from_entropy(), MonitoringConfig::default())?;
//!
//! tracker.pair(Platform::Ios, "iPhone 15 Pro")?;
//! let mut session = tracker.watch_session();
//! while session.changed().await.is_ok() {
//!     println!("{:?}", session.borrow().distance_meters());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod location;
pub mod monitor;
pub mod position;
pub mod shared;
pub mod tracker;

pub use location::{
    CommandLocation, FixedLocation, LocationError, LocationProvider, MockLocation,
    PositionOptions, DEFAULT_LOCATION_COMMAND,
};
pub use monitor::{Monitor, MonitorError, MonitorEvent, MonitorSettings};
pub use position::{PositionSource, FALLBACK_COORDINATE};
pub use shared::SharedSession;
pub use tracker::{scan_devices, Tracker, TrackerError};
