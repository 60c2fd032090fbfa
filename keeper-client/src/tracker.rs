//! Tracker - the main interface for Tracker Keeper.
//!
//! [`Tracker`] ties the session state machine to its side effects: it feeds
//! pairing and disconnect requests through
//! [`SessionState::on_event`](keeper_core::SessionState::on_event) and
//! interprets the returned actions (handshake timer, monitor start/stop).
//!
//! ```text
//! Front end → Tracker → SharedSession (keeper-core state machine)
//!                 ↓
//!              Monitor → PositionSource → LocationProvider
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keeper_core::{
    discoverable_devices, PhaseAction, PhaseEvent, RandomSource, Sample, SessionState,
    DRIFT_NUDGE, SCAN_DELAY,
};
use keeper_types::{
    ConfigError, ConnectionPhase, MonitoringConfig, Platform, DEFAULT_DRIFT_MAGNITUDE,
};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::location::LocationProvider;
use crate::monitor::{Monitor, MonitorEvent, MonitorSettings};
use crate::position::PositionSource;
use crate::shared::SharedSession;

/// Tracker errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// Settings rejected by validation.
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),

    /// Pairing requested while a device is already pairing or paired.
    #[error("cannot pair while {phase}")]
    AlreadyPaired {
        /// Phase at the time of the request.
        phase: ConnectionPhase,
    },
}

/// Simulated device scan.
///
/// Waits [`SCAN_DELAY`] and returns the devices "found" nearby.
pub async fn scan_devices(platform: Platform) -> &'static [&'static str] {
    tracing::debug!("Scanning for {} devices", platform);
    tokio::time::sleep(SCAN_DELAY).await;
    discoverable_devices(platform)
}

#[derive(Debug, Clone)]
struct TrackerSettings {
    config: MonitoringConfig,
    drift_magnitude: f64,
}

struct TrackerInner<L, R> {
    session: SharedSession,
    monitor: Monitor<L, R>,
    settings: Mutex<TrackerSettings>,
    handshake: Mutex<Option<JoinHandle<()>>>,
}

/// The proximity tracker.
///
/// Owns the session, the monitor loop and the current settings.
/// Dropping the tracker stops the monitor.
pub struct Tracker<L, R>
where
    L: LocationProvider + 'static,
    R: RandomSource + Send + 'static,
{
    inner: Arc<TrackerInner<L, R>>,
}

impl<L, R> Tracker<L, R>
where
    L: LocationProvider + 'static,
    R: RandomSource + Send + 'static,
{
    /// Create a disconnected tracker.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] if `config` is invalid.
    pub fn new(
        source: PositionSource<L>,
        rng: R,
        config: MonitoringConfig,
    ) -> Result<Self, TrackerError> {
        let monitor_settings = MonitorSettings::new(&config, DEFAULT_DRIFT_MAGNITUDE)?;
        let session = SharedSession::new();
        let monitor = Monitor::new(source, rng, session.clone(), monitor_settings);

        Ok(Self {
            inner: Arc::new(TrackerInner {
                session,
                monitor,
                settings: Mutex::new(TrackerSettings {
                    config,
                    drift_magnitude: DEFAULT_DRIFT_MAGNITUDE,
                }),
                handshake: Mutex::new(None),
            }),
        })
    }

    /// Start pairing with a device.
    ///
    /// The session moves to Searching now and to Connected once the
    /// simulated handshake completes, at which point monitoring starts.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::AlreadyPaired`] unless the session is
    /// Disconnected.
    pub fn pair(
        &self,
        platform: Platform,
        device_name: impl Into<String>,
    ) -> Result<(), TrackerError> {
        let device_name = device_name.into();
        tracing::info!("Pairing with {} ({})", device_name, platform);

        let actions = self.inner.session.transition(PhaseEvent::PairRequested {
            platform,
            device_name,
        });
        if actions.is_empty() {
            return Err(TrackerError::AlreadyPaired {
                phase: self.inner.session.snapshot().phase(),
            });
        }

        execute(&self.inner, actions);
        Ok(())
    }

    /// Disconnect, cancelling a pending handshake or the monitor loop.
    ///
    /// Clears positions, distance and the range flag. Does nothing when
    /// already disconnected.
    pub fn disconnect(&self) {
        let actions = self.inner.session.transition(PhaseEvent::DisconnectRequested);
        if actions.is_empty() {
            tracing::debug!("Disconnect ignored, not paired");
            return;
        }
        tracing::info!("Disconnected");
        execute(&self.inner, actions);
    }

    /// Sample once now. `None` when not connected.
    pub async fn refresh(&self) -> Option<Sample> {
        self.inner.monitor.refresh().await
    }

    /// Validate and apply new monitoring settings.
    ///
    /// A running monitor is re-armed with the new values.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] and keeps the old settings if
    /// `config` is invalid.
    pub fn apply_settings(&self, config: MonitoringConfig) -> Result<(), TrackerError> {
        let mut settings = lock(&self.inner.settings);
        let monitor_settings = MonitorSettings::new(&config, settings.drift_magnitude)?;

        tracing::info!(
            "Settings applied: range {}m, interval {} min",
            config.max_range_meters,
            config.update_interval_minutes
        );
        self.inner.monitor.reconfigure(monitor_settings);
        settings.config = config;
        Ok(())
    }

    /// Set the simulated companion drift, in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] for negative or non-finite values.
    pub fn set_drift(&self, drift_magnitude: f64) -> Result<(), TrackerError> {
        let mut settings = lock(&self.inner.settings);
        let monitor_settings = MonitorSettings::new(&settings.config, drift_magnitude)?;

        tracing::debug!("Drift set to {}", drift_magnitude);
        self.inner.monitor.reconfigure(monitor_settings);
        settings.drift_magnitude = drift_magnitude;
        Ok(())
    }

    /// Push the companion further away (+[`DRIFT_NUDGE`] degrees of drift).
    ///
    /// Returns the new drift magnitude.
    pub fn nudge_drift(&self) -> Result<f64, TrackerError> {
        let drift = self.drift() + DRIFT_NUDGE;
        self.set_drift(drift)?;
        Ok(drift)
    }

    /// Current session snapshot.
    pub fn session(&self) -> SessionState {
        self.inner.session.snapshot()
    }

    /// Watch the session for changes.
    pub fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.inner.session.subscribe()
    }

    /// Subscribe to sample and range events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.monitor.subscribe()
    }

    /// Current monitoring settings.
    pub fn settings(&self) -> MonitoringConfig {
        lock(&self.inner.settings).config.clone()
    }

    /// Current drift magnitude, in degrees.
    pub fn drift(&self) -> f64 {
        lock(&self.inner.settings).drift_magnitude
    }

    /// The monitor loop.
    pub fn monitor(&self) -> &Monitor<L, R> {
        &self.inner.monitor
    }
}

impl<L, R> Drop for Tracker<L, R>
where
    L: LocationProvider + 'static,
    R: RandomSource + Send + 'static,
{
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.inner.handshake).take() {
            handle.abort();
        }
        self.inner.monitor.stop();
    }
}

impl<L, R> std::fmt::Debug for Tracker<L, R>
where
    L: LocationProvider + 'static,
    R: RandomSource + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("session", &self.inner.session.snapshot())
            .field("monitor", &self.inner.monitor)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Execute actions returned by the state machine.
fn execute<L, R>(inner: &Arc<TrackerInner<L, R>>, actions: Vec<PhaseAction>)
where
    L: LocationProvider + 'static,
    R: RandomSource + Send + 'static,
{
    for action in actions {
        match action {
            PhaseAction::StartHandshakeTimer { delay } => {
                let task_inner = Arc::clone(inner);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let actions = task_inner
                        .session
                        .transition(PhaseEvent::HandshakeCompleted);
                    execute(&task_inner, actions);
                });
                if let Some(old) = lock(&inner.handshake).replace(handle) {
                    old.abort();
                }
            }
            PhaseAction::CancelHandshake => {
                if let Some(handle) = lock(&inner.handshake).take() {
                    handle.abort();
                }
            }
            PhaseAction::StartMonitoring => {
                let session = inner.session.snapshot();
                tracing::info!(
                    "Connected to {} ({})",
                    session.device_name().unwrap_or("unknown device"),
                    session.platform()
                );
                inner.monitor.start();
            }
            PhaseAction::StopMonitoring => inner.monitor.stop(),
        }
    }
}
