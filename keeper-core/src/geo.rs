//! Great-circle distance.

use keeper_types::Coordinate;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Calculate the great-circle distance between two coordinates.
///
/// Uses the haversine formula. Inputs are degrees; altitude and accuracy are
/// ignored. Latitude and longitude are not range-checked.
///
/// # Returns
///
/// Distance in meters.
///
/// # Example
///
/// ```
/// use tracker_keeper_core::distance;
/// use keeper_types::Coordinate;
///
/// // One degree of longitude at the equator
/// let d = distance(&Coordinate::new(0.0, 0.0), &Coordinate::new(0.0, 1.0));
/// assert!((d - 111_195.0).abs() < 1.0);
/// ```
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h just past 1.0 near antipodes
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    #[test]
    fn one_degree_longitude_at_equator() {
        let d = distance(&coord(0.0, 0.0), &coord(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn one_degree_latitude() {
        let d = distance(&coord(0.0, 0.0), &coord(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn same_point_is_zero() {
        let p = coord(40.7128, -74.0060);
        assert!(distance(&p, &p).abs() < EPSILON);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (coord(40.7128, -74.0060), coord(40.7133, -74.0055)),
            (coord(-33.8688, 151.2093), coord(51.5074, -0.1278)),
            (coord(89.9, 10.0), coord(-89.9, -170.0)),
            (coord(0.0, 179.9), coord(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            let ab = distance(&a, &b);
            let ba = distance(&b, &a);
            assert!((ab - ba).abs() < EPSILON, "{ab} != {ba}");
            assert!(ab >= 0.0);
        }
    }

    #[test]
    fn manhattan_offset_distance() {
        // 0.0005 degrees on both axes at 40.7N
        let phone = coord(40.7128, -74.0060);
        let watch = coord(40.7133, -74.0055);
        let d = distance(&phone, &watch);
        assert!((d - 69.8).abs() < 0.5, "got {d}");
    }

    #[test]
    fn antimeridian_is_short_way_round() {
        let d = distance(&coord(0.0, 179.5), &coord(0.0, -179.5));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let half = std::f64::consts::PI * EARTH_RADIUS_METERS;
        for i in 0..2000 {
            let lat = -89.0 + (i % 179) as f64 + (i as f64) * 0.000_37;
            let lon = -180.0 + (i as f64) * 0.179;
            let d = distance(&coord(lat, lon), &coord(-lat, lon + 180.0));
            assert!(!d.is_nan(), "NaN at ({lat}, {lon})");
            assert!((d - half).abs() < 1.0, "got {d} at ({lat}, {lon})");
        }
    }

    #[test]
    fn altitude_is_ignored() {
        let a = coord(10.0, 10.0).with_altitude(0.0);
        let b = coord(10.0, 10.0).with_altitude(8_000.0);
        assert!(distance(&a, &b).abs() < EPSILON);
    }
}
