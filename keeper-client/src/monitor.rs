//! The proximity monitor loop.
//!
//! While the session is connected, [`Monitor`] owns exactly one timer task.
//! Each tick runs a sampling cycle:
//!
//! ```text
//! PositionSource → simulate_companion → distance → threshold → SharedSession
//! ```
//!
//! Stopping or reconfiguring the monitor aborts the armed task and bumps an
//! epoch counter before anything new is armed. A cycle that was already in
//! flight carries the old epoch and is discarded when it tries to write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use keeper_core::{simulate_companion, RandomSource, RangeTransition, Sample, SessionError};
use keeper_types::{validate_drift, ConfigError, MonitoringConfig};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::location::LocationProvider;
use crate::position::PositionSource;
use crate::shared::SharedSession;

const EVENT_CAPACITY: usize = 64;

/// Errors from a single sampling cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// The session refused the sample.
    #[error("sample rejected: {0}")]
    Session(#[from] SessionError),

    /// The timer that started this cycle was cancelled while it ran.
    #[error("cycle from epoch {epoch} superseded by epoch {current}")]
    Superseded {
        /// Epoch the cycle started under.
        epoch: u64,
        /// Epoch at the time of the write.
        current: u64,
    },
}

impl MonitorError {
    /// True for cycles that lost a race with disconnect or reconfiguration.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            MonitorError::Superseded { .. }
                | MonitorError::Session(SessionError::NotConnected { .. })
        )
    }
}

/// Events published for alerting front ends.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A sample was recorded.
    Sampled(Sample),
    /// The companion left the allowed range.
    RangeViolated {
        /// Measured distance.
        distance_meters: f64,
        /// Threshold in force.
        max_range_meters: f64,
    },
    /// The companion came back within range.
    RangeRestored {
        /// Measured distance.
        distance_meters: f64,
    },
}

/// Validated parameters of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    /// Maximum allowed distance, in meters.
    pub max_range_meters: f64,
    /// Time between samples.
    pub interval: Duration,
    /// Spread of the simulated companion position, in degrees.
    pub drift_magnitude: f64,
}

impl MonitorSettings {
    /// Validate user settings and a drift magnitude.
    pub fn new(config: &MonitoringConfig, drift_magnitude: f64) -> Result<Self, ConfigError> {
        config.validate()?;
        validate_drift(drift_magnitude)?;
        Ok(Self {
            max_range_meters: config.max_range_meters,
            interval: config.update_interval()?,
            drift_magnitude,
        })
    }
}

struct ArmedTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

struct MonitorInner<L, R> {
    source: PositionSource<L>,
    rng: Mutex<R>,
    session: SharedSession,
    settings: Mutex<MonitorSettings>,
    epoch: AtomicU64,
    timer: Mutex<Option<ArmedTimer>>,
    events: broadcast::Sender<MonitorEvent>,
}

/// Periodic sampler for a connected session.
///
/// Cloning gives another handle to the same monitor.
pub struct Monitor<L, R> {
    inner: Arc<MonitorInner<L, R>>,
}

impl<L, R> Clone for Monitor<L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, R> std::fmt::Debug for Monitor<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let settings = *lock(&self.inner.settings);
        f.debug_struct("Monitor")
            .field("settings", &settings)
            .field("epoch", &self.inner.epoch.load(Ordering::SeqCst))
            .field("running", &self.is_running())
            .finish()
    }
}

impl<L, R> Monitor<L, R>
where
    L: LocationProvider + 'static,
    R: RandomSource + Send + 'static,
{
    /// Create a stopped monitor writing into `session`.
    pub fn new(
        source: PositionSource<L>,
        rng: R,
        session: SharedSession,
        settings: MonitorSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(MonitorInner {
                source,
                rng: Mutex::new(rng),
                session,
                settings: Mutex::new(settings),
                epoch: AtomicU64::new(0),
                timer: Mutex::new(None),
                events,
            }),
        }
    }

    /// Arm the timer: one cycle now, then one per interval.
    ///
    /// Any previously armed timer is cancelled first. Nothing is armed
    /// unless the session is connected. Must be called from within a Tokio
    /// runtime.
    pub fn start(&self) {
        let mut timer = lock(&self.inner.timer);
        self.arm(&mut timer);
    }

    /// Cancel the timer. In-flight cycles are discarded.
    pub fn stop(&self) {
        let mut timer = lock(&self.inner.timer);
        if timer.is_some() {
            tracing::info!("Monitor stopped");
        }
        cancel(&mut timer, &self.inner.epoch);
    }

    /// Replace the settings, re-arming the timer if it is running.
    pub fn reconfigure(&self, settings: MonitorSettings) {
        let mut timer = lock(&self.inner.timer);
        *lock(&self.inner.settings) = settings;
        if timer.is_some() {
            self.arm(&mut timer);
        }
    }

    /// Run one cycle now, outside the timer.
    ///
    /// Returns `None` without sampling when the session is not connected,
    /// and `None` when the cycle lost a race with disconnect.
    pub async fn refresh(&self) -> Option<Sample> {
        if !self.inner.session.snapshot().is_connected() {
            tracing::debug!("Refresh ignored, session not connected");
            return None;
        }
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        match run_cycle(&self.inner, epoch).await {
            Ok(sample) => Some(sample),
            Err(e) => {
                log_cycle_error(&e);
                None
            }
        }
    }

    // Lock order: timer, then settings
    fn arm(&self, timer: &mut Option<ArmedTimer>) {
        cancel(timer, &self.inner.epoch);
        if !self.inner.session.snapshot().is_connected() {
            tracing::debug!("Monitor not armed, session not connected");
            return;
        }

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        let period = lock(&self.inner.settings).interval;
        tracing::info!("Monitor armed (epoch {}, every {:?})", epoch, period);

        let handle = tokio::spawn(run_timer(Arc::clone(&self.inner), epoch, period));
        *timer = Some(ArmedTimer { epoch, handle });
    }
}

impl<L, R> Monitor<L, R> {
    /// Whether a timer is armed.
    pub fn is_running(&self) -> bool {
        lock(&self.inner.timer).is_some()
    }

    /// Current settings.
    pub fn settings(&self) -> MonitorSettings {
        *lock(&self.inner.settings)
    }

    /// Epoch of the armed timer, if any.
    pub fn armed_epoch(&self) -> Option<u64> {
        lock(&self.inner.timer).as_ref().map(|t| t.epoch)
    }

    /// Subscribe to sample and range events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    /// Session this monitor writes into.
    pub fn session(&self) -> &SharedSession {
        &self.inner.session
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn cancel(timer: &mut Option<ArmedTimer>, epoch: &AtomicU64) {
    if let Some(armed) = timer.take() {
        armed.handle.abort();
    }
    epoch.fetch_add(1, Ordering::SeqCst);
}

async fn run_timer<L, R>(inner: Arc<MonitorInner<L, R>>, epoch: u64, period: Duration)
where
    L: LocationProvider,
    R: RandomSource + Send,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = run_cycle(&inner, epoch).await {
            log_cycle_error(&e);
        }
    }
}

async fn run_cycle<L, R>(inner: &MonitorInner<L, R>, epoch: u64) -> Result<Sample, MonitorError>
where
    L: LocationProvider,
    R: RandomSource + Send,
{
    let primary = inner.source.current_position().await;
    let settings = *lock(&inner.settings);

    let companion = {
        let mut rng = lock(&inner.rng);
        simulate_companion(&primary, settings.drift_magnitude, &mut *rng)
    };
    let sample = Sample::measure(primary, companion, now_ms());

    let transition = inner.session.update(|state| {
        let current = inner.epoch.load(Ordering::SeqCst);
        if current != epoch {
            return Err(MonitorError::Superseded { epoch, current });
        }
        state
            .apply_sample(&sample, settings.max_range_meters)
            .map_err(MonitorError::from)
    })?;

    tracing::debug!(
        "Sampled {:.1}m (limit {}m) epoch {}",
        sample.distance_meters,
        settings.max_range_meters,
        epoch
    );

    // Send only fails when nobody listens
    let _ = inner.events.send(MonitorEvent::Sampled(sample));
    match transition {
        Some(RangeTransition::Violated) => {
            tracing::warn!(
                "Companion out of range: {:.1}m > {}m",
                sample.distance_meters,
                settings.max_range_meters
            );
            let _ = inner.events.send(MonitorEvent::RangeViolated {
                distance_meters: sample.distance_meters,
                max_range_meters: settings.max_range_meters,
            });
        }
        Some(RangeTransition::Restored) => {
            tracing::info!("Companion back in range: {:.1}m", sample.distance_meters);
            let _ = inner.events.send(MonitorEvent::RangeRestored {
                distance_meters: sample.distance_meters,
            });
        }
        None => {}
    }

    Ok(sample)
}

fn log_cycle_error(error: &MonitorError) {
    if error.is_stale() {
        tracing::debug!("Discarded monitor cycle: {}", error);
    } else {
        tracing::error!("Monitor cycle failed: {}", error);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{LocationError, MockLocation};
    use keeper_core::{PhaseEvent, SequenceSource};
    use keeper_types::{Coordinate, Platform};

    const TICK: Duration = Duration::from_secs(60);

    fn phone() -> Coordinate {
        Coordinate::new(40.0, -74.0).with_altitude(20.0)
    }

    fn settings(max_range_meters: f64, drift_magnitude: f64) -> MonitorSettings {
        MonitorSettings {
            max_range_meters,
            interval: TICK,
            drift_magnitude,
        }
    }

    fn connected_session() -> SharedSession {
        let session = SharedSession::new();
        session.transition(PhaseEvent::PairRequested {
            platform: Platform::Ios,
            device_name: "iPhone 15 Pro".into(),
        });
        session.transition(PhaseEvent::HandshakeCompleted);
        session
    }

    fn monitor_with(
        mock: &MockLocation,
        rng: SequenceSource,
        session: SharedSession,
        settings: MonitorSettings,
    ) -> Monitor<MockLocation, SequenceSource> {
        Monitor::new(PositionSource::new(mock.clone()), rng, session, settings)
    }

    /// Let spawned tasks run without moving the paused clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ===========================================
    // Settings Tests
    // ===========================================

    #[test]
    fn settings_from_valid_config() {
        let config = MonitoringConfig::default().with_update_interval(0.5);
        let s = MonitorSettings::new(&config, 0.0001).unwrap();
        assert_eq!(s.interval, Duration::from_secs(30));
        assert_eq!(s.max_range_meters, 50.0);
    }

    #[test]
    fn settings_reject_invalid_values() {
        let bad_range = MonitoringConfig::default().with_max_range(-1.0);
        assert_eq!(
            MonitorSettings::new(&bad_range, 0.0001),
            Err(ConfigError::InvalidRange(-1.0))
        );

        let bad_interval = MonitoringConfig::default().with_update_interval(0.0);
        assert_eq!(
            MonitorSettings::new(&bad_interval, 0.0001),
            Err(ConfigError::InvalidInterval(0.0))
        );

        assert!(matches!(
            MonitorSettings::new(&MonitoringConfig::default(), f64::NAN),
            Err(ConfigError::InvalidDrift(_))
        ));
    }

    // ===========================================
    // Timer Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn start_samples_immediately_then_per_interval() {
        let mock = MockLocation::fixed(phone());
        let session = connected_session();
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            session.clone(),
            settings(50.0, 0.0),
        );

        monitor.start();
        settle().await;
        assert_eq!(mock.request_count(), 1);
        assert_eq!(session.snapshot().distance_meters(), Some(0.0));

        tokio::time::sleep(TICK + Duration::from_millis(1)).await;
        assert_eq!(mock.request_count(), 2);

        tokio::time::sleep(TICK).await;
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timer() {
        let mock = MockLocation::fixed(phone());
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            connected_session(),
            settings(50.0, 0.0),
        );

        monitor.start();
        settle().await;
        monitor.stop();
        assert!(!monitor.is_running());

        tokio::time::sleep(TICK * 5).await;
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_rearms_with_new_epoch() {
        let mock = MockLocation::fixed(phone());
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            connected_session(),
            settings(50.0, 0.0),
        );

        monitor.start();
        settle().await;
        let first = monitor.armed_epoch().unwrap();

        let mut faster = settings(50.0, 0.0);
        faster.interval = Duration::from_secs(30);
        monitor.reconfigure(faster);
        settle().await;

        let second = monitor.armed_epoch().unwrap();
        assert!(second > first);
        // Re-arming samples immediately. The reading is still cached.
        assert_eq!(monitor.settings().interval, Duration::from_secs(30));
        assert_eq!(mock.request_count(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(mock.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn old_interval_never_fires_after_reconfigure() {
        let mock = MockLocation::fixed(phone());
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            connected_session(),
            settings(50.0, 0.0),
        );
        let mut events = monitor.subscribe();

        monitor.start();
        settle().await;
        let mut faster = settings(50.0, 0.0);
        faster.interval = Duration::from_secs(30);
        monitor.reconfigure(faster);

        // Samples at 0 (start), 0 (re-arm), 30 and 60
        tokio::time::sleep(Duration::from_secs(61)).await;
        let mut sampled = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, MonitorEvent::Sampled(_)) {
                sampled += 1;
            }
        }
        assert_eq!(sampled, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn start_on_disconnected_session_does_not_arm() {
        let mock = MockLocation::fixed(phone());
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            SharedSession::new(),
            settings(50.0, 0.0),
        );

        monitor.start();
        settle().await;
        assert!(!monitor.is_running());
        assert_eq!(monitor.armed_epoch(), None);

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_after_disconnect_disarms() {
        let mock = MockLocation::fixed(phone());
        let session = connected_session();
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            session.clone(),
            settings(50.0, 0.0),
        );

        monitor.start();
        settle().await;
        session.transition(PhaseEvent::DisconnectRequested);

        monitor.reconfigure(settings(100.0, 0.0));
        settle().await;
        assert!(!monitor.is_running());
        assert_eq!(monitor.settings().max_range_meters, 100.0);

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_survives_failing_cycles() {
        let mock = MockLocation::fixed(phone());
        let session = connected_session();
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            session.clone(),
            settings(50.0, 0.0),
        );

        monitor.start();
        settle().await;
        assert_eq!(mock.request_count(), 1);

        // Every later cycle is refused by the session
        session.transition(PhaseEvent::DisconnectRequested);

        tokio::time::sleep(TICK + Duration::from_millis(1)).await;
        assert_eq!(mock.request_count(), 2);
        tokio::time::sleep(TICK * 2).await;
        assert_eq!(mock.request_count(), 4);

        assert!(monitor.is_running());
        assert!(session.snapshot().distance_meters().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn debug_reports_settings_and_state() {
        let mock = MockLocation::fixed(phone());
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            connected_session(),
            settings(50.0, 0.0),
        );
        monitor.start();

        let text = format!("{monitor:?}");
        assert!(text.contains("max_range_meters: 50.0"), "{text}");
        assert!(text.contains("running: true"), "{text}");
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_while_stopped_does_not_arm() {
        let mock = MockLocation::fixed(phone());
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            connected_session(),
            settings(50.0, 0.0),
        );

        monitor.reconfigure(settings(100.0, 0.0));
        settle().await;
        assert!(!monitor.is_running());
        assert_eq!(mock.request_count(), 0);
        assert_eq!(monitor.settings().max_range_meters, 100.0);
    }

    // ===========================================
    // Cycle Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn stale_cycle_is_discarded() {
        let mock = MockLocation::fixed(phone());
        mock.set_delay(Duration::from_secs(5));
        let session = connected_session();
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            session.clone(),
            settings(50.0, 0.0),
        );

        let refreshing = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.refresh().await }
        });
        settle().await;

        // Epoch moves on while the location read is pending
        monitor.start();
        monitor.stop();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(refreshing.await.unwrap(), None);
        assert!(session.snapshot().distance_meters().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_noop_when_disconnected() {
        let mock = MockLocation::fixed(phone());
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            SharedSession::new(),
            settings(50.0, 0.0),
        );

        assert_eq!(monitor.refresh().await, None);
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_records_sample() {
        let mock = MockLocation::fixed(phone());
        let session = connected_session();
        // lat +0.5*drift, lon -0.5*drift, altitude jitter 0.25*2
        let rng = SequenceSource::new([1.0, 0.0, 0.25]);
        let monitor = monitor_with(&mock, rng, session.clone(), settings(50.0, 0.0001));

        let sample = monitor.refresh().await.unwrap();
        let state = session.snapshot();

        assert_eq!(state.primary_position(), Some(&phone()));
        assert_eq!(state.companion_position(), Some(&sample.companion));
        assert_eq!(sample.companion.altitude, Some(20.5));
        assert_eq!(sample.companion.accuracy, Some(5.0));
        assert!((sample.companion.latitude - 40.00005).abs() < 1e-9);
        assert!((sample.companion.longitude - -74.00005).abs() < 1e-9);
        assert_eq!(state.distance_meters(), Some(sample.distance_meters));
        assert!(!state.is_out_of_range());
        assert!(state.last_updated_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_position_still_produces_sample() {
        let mock = MockLocation::new();
        mock.fail_next(LocationError::PermissionDenied);
        let session = connected_session();
        let monitor = monitor_with(
            &mock,
            SequenceSource::default(),
            session.clone(),
            settings(50.0, 0.0),
        );

        let sample = monitor.refresh().await.unwrap();
        assert_eq!(sample.primary, crate::FALLBACK_COORDINATE);
        assert_eq!(session.snapshot().distance_meters(), Some(0.0));
    }

    // ===========================================
    // Event Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn range_violation_and_restore_are_published() {
        let mock = MockLocation::fixed(phone());
        let session = connected_session();
        // Two draws per sample (primary has altitude, so three)
        let rng = SequenceSource::new([1.0, 1.0, 0.0]);
        let monitor = monitor_with(&mock, rng, session.clone(), settings(50.0, 0.01));
        let mut events = monitor.subscribe();

        let far = monitor.refresh().await.unwrap();
        assert!(far.distance_meters > 50.0);
        assert!(session.snapshot().is_out_of_range());

        assert!(matches!(events.recv().await.unwrap(), MonitorEvent::Sampled(_)));
        assert_eq!(
            events.recv().await.unwrap(),
            MonitorEvent::RangeViolated {
                distance_meters: far.distance_meters,
                max_range_meters: 50.0,
            }
        );

        monitor.reconfigure(settings(50.0, 0.0));
        let near = monitor.refresh().await.unwrap();
        assert_eq!(near.distance_meters, 0.0);
        assert!(!session.snapshot().is_out_of_range());

        assert!(matches!(events.recv().await.unwrap(), MonitorEvent::Sampled(_)));
        assert_eq!(
            events.recv().await.unwrap(),
            MonitorEvent::RangeRestored {
                distance_meters: 0.0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_violation_publishes_once() {
        let mock = MockLocation::fixed(phone());
        let rng = SequenceSource::new([1.0, 1.0, 0.0]);
        let monitor = monitor_with(&mock, rng, connected_session(), settings(50.0, 0.01));
        let mut events = monitor.subscribe();

        monitor.refresh().await.unwrap();
        monitor.refresh().await.unwrap();

        let mut violations = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, MonitorEvent::RangeViolated { .. }) {
                violations += 1;
            }
        }
        assert_eq!(violations, 1);
    }

    #[test]
    fn stale_errors_are_classified() {
        assert!(MonitorError::Superseded { epoch: 1, current: 2 }.is_stale());
        assert!(MonitorError::Session(SessionError::NotConnected {
            phase: keeper_types::ConnectionPhase::Disconnected
        })
        .is_stale());
    }
}
