//! One-off distance between two coordinates.

use anyhow::Result;
use keeper_core::{distance, is_out_of_range};
use keeper_types::Coordinate;

/// Run the distance command.
pub fn run(from: Coordinate, to: Coordinate, max_range_meters: Option<f64>) -> Result<()> {
    println!("{}", report(&from, &to, max_range_meters));
    Ok(())
}

fn report(from: &Coordinate, to: &Coordinate, max_range_meters: Option<f64>) -> String {
    let meters = distance(from, to);
    let mut line = format!("{} -> {}: {}", from, to, format_distance(meters));
    if let Some(max) = max_range_meters {
        let verdict = if is_out_of_range(meters, max) {
            "OUT OF RANGE"
        } else {
            "in range"
        };
        line.push_str(&format!(" ({} of {}m)", verdict, max));
    }
    line
}

/// Human-readable distance: meters below 1km, kilometers above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.1}m", meters)
    } else {
        format!("{:.2}km", meters / 1000.0)
    }
}
