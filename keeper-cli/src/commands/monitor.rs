//! Pair with a device and watch its distance live.
//!
//! Status lines go to stdout (plain text, or JSON snapshots with `--json`).
//! While running, stdin accepts short commands:
//!
//! ```text
//! r            refresh now
//! m            simulate movement (+0.001° drift)
//! range <m>    set max range
//! interval <n> set update interval in minutes
//! q            disconnect and quit
//! ```

use anyhow::{bail, Context, Result};
use keeper_client::{scan_devices, LocationProvider, MonitorEvent, Tracker};
use keeper_core::{protocol_banner, RandomSource, RngSource, SessionState};
use keeper_types::{ConnectionPhase, Platform};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::distance::format_distance;
use crate::config::Config;

/// Options for the monitor command.
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Platform of the device to pair with.
    pub platform: Platform,
    /// Device name; the first scanned device when absent.
    pub device: Option<String>,
    /// Print JSON snapshots instead of status lines.
    pub json: bool,
    /// Stop after this many samples.
    pub samples: Option<usize>,
    /// Read commands from stdin.
    pub interactive: bool,
}

/// Commands typed while monitoring.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Refresh,
    Move,
    Range(f64),
    Interval(f64),
    Quit,
    Help,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".into());
    };
    let mut number = || -> Result<f64, String> {
        words
            .next()
            .ok_or_else(|| format!("{verb} needs a value"))?
            .parse::<f64>()
            .map_err(|e| format!("{verb}: {e}"))
    };

    match verb {
        "r" | "refresh" => Ok(Command::Refresh),
        "m" | "move" => Ok(Command::Move),
        "range" => Ok(Command::Range(number()?)),
        "interval" => Ok(Command::Interval(number()?)),
        "q" | "quit" | "d" | "disconnect" => Ok(Command::Quit),
        "h" | "help" | "?" => Ok(Command::Help),
        other => Err(format!("unknown command: {other}")),
    }
}

/// One-line summary of the session.
fn format_status(state: &SessionState, max_range_meters: f64) -> String {
    let device = state.device_name().unwrap_or("unknown device");
    match state.phase() {
        ConnectionPhase::Disconnected => "Disconnected".to_string(),
        ConnectionPhase::Searching => format!("Searching... pairing with {}", device),
        ConnectionPhase::Connected => match (
            state.distance_meters(),
            state.primary_position(),
            state.companion_position(),
        ) {
            (Some(meters), Some(phone), Some(watch)) => {
                let verdict = if state.is_out_of_range() {
                    "OUT OF RANGE"
                } else {
                    "in range"
                };
                format!(
                    "[{}] {}: {} ({}, limit {}m) | phone {} | watch {}",
                    state.platform(),
                    device,
                    format_distance(meters),
                    verdict,
                    max_range_meters,
                    phone,
                    watch
                )
            }
            _ => format!(
                "Connected to {} ({}), waiting for first fix",
                device,
                state.platform()
            ),
        },
    }
}

/// Device to pair with: the requested one, or the first a scan finds.
async fn choose_device(platform: Platform, requested: Option<&str>) -> Result<String> {
    if let Some(name) = requested {
        return Ok(name.to_string());
    }
    println!("Scanning for nearby {} devices...", platform);
    scan_devices(platform)
        .await
        .first()
        .map(|name| name.to_string())
        .with_context(|| {
            format!(
                "No {} devices found, pass --platform ios|android or --device <name>",
                platform
            )
        })
}

fn print_state(state: &SessionState, max_range_meters: f64, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(state)?);
    } else {
        println!("{}", format_status(state, max_range_meters));
    }
    Ok(())
}

/// Apply a typed command. Returns `false` when monitoring should end.
async fn handle_command<L, R>(tracker: &Tracker<L, R>, command: Command) -> bool
where
    L: LocationProvider + 'static,
    R: RandomSource + Send + 'static,
{
    match command {
        Command::Refresh => {
            if tracker.refresh().await.is_none() {
                println!("Not connected yet");
            }
        }
        Command::Move => match tracker.nudge_drift() {
            Ok(drift) => println!("Simulating movement, drift now {:.4}°", drift),
            Err(e) => println!("Rejected: {}", e),
        },
        Command::Range(meters) => {
            let config = tracker.settings().with_max_range(meters);
            if let Err(e) = tracker.apply_settings(config) {
                println!("Rejected: {}", e);
            }
        }
        Command::Interval(minutes) => {
            let config = tracker.settings().with_update_interval(minutes);
            if let Err(e) = tracker.apply_settings(config) {
                println!("Rejected: {}", e);
            }
        }
        Command::Help => {
            println!("Commands: r(efresh), m(ove), range <m>, interval <min>, q(uit)");
        }
        Command::Quit => return false,
    }
    true
}

/// Run the monitor command.
pub async fn run(config: Config, options: MonitorOptions) -> Result<()> {
    let rng = match config.simulation.seed {
        Some(seed) => RngSource::seeded(seed),
        None => RngSource::from_entropy(),
    };
    let tracker = Tracker::new(
        config.location.position_source(),
        rng,
        config.monitoring.clone(),
    )
    .context("Invalid monitoring settings")?;
    tracker
        .set_drift(config.simulation.drift_magnitude)
        .context("Invalid drift magnitude")?;

    if options.samples == Some(0) {
        bail!("--samples must be at least 1");
    }

    let device = choose_device(options.platform, options.device.as_deref()).await?;
    println!("{}", protocol_banner(options.platform));

    let mut session = tracker.watch_session();
    let mut events = tracker.subscribe_events();
    tracker.pair(options.platform, device)?;

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = options.interactive;
    let mut samples = 0usize;

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = session.borrow_and_update().clone();
                print_state(&state, tracker.settings().max_range_meters, options.json)?;
            }
            event = events.recv() => match event {
                Ok(MonitorEvent::Sampled(_)) => {
                    samples += 1;
                    if options.samples.is_some_and(|max| samples >= max) {
                        break;
                    }
                }
                Ok(MonitorEvent::RangeViolated { distance_meters, max_range_meters }) => {
                    println!(
                        "ALERT: companion is {} away (limit {}m)",
                        format_distance(distance_meters),
                        max_range_meters
                    );
                }
                Ok(MonitorEvent::RangeRestored { distance_meters }) => {
                    println!("Companion back in range ({})", format_distance(distance_meters));
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Status view fell behind, {} events skipped", missed);
                }
                Err(RecvError::Closed) => break,
            },
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(command) => {
                        if !handle_command(&tracker, command).await {
                            break;
                        }
                    }
                    Err(e) => println!("{} (type h for help)", e),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!("Stopped reading commands: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    tracker.disconnect();
    Ok(())
}
