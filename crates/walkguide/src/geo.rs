//! Geodesic helpers for pedestrian guidance.
//!
//! Everything here is pure: great-circle distance, initial bearing, signed
//! angle difference and the mapping of an angle onto a 12-hour clock face.
//! Coordinates are WGS84 degrees.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Angle differences smaller than this (in degrees) are announced as "ahead".
pub const AHEAD_TOLERANCE_DEG: f64 = 20.0;

/// Errors raised for coordinates outside the geodesic domain.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    /// Latitude or longitude is non-finite or out of range.
    #[error("invalid position: latitude {latitude}, longitude {longitude}")]
    InvalidPosition {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
}

/// A single GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Capture time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp_ms: i64,
}

impl Position {
    /// Create a position stamped with the given time.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
        }
    }

    /// Create a position stamped with the current wall-clock time.
    #[must_use]
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Utc::now().timestamp_millis())
    }

    /// Check that both coordinates are finite and within range.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidPosition`] for NaN, infinite or
    /// out-of-range coordinates.
    pub fn validate(&self) -> Result<(), GeoError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(GeoError::InvalidPosition {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    /// Whether the coordinates pass [`Position::validate`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The capture time as a UTC timestamp, if representable.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }

    /// Whether two fixes refer to the same point, ignoring timestamps.
    #[must_use]
    pub fn same_point(&self, other: &Self) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

/// Great-circle distance between two positions in meters (haversine).
#[must_use]
pub fn distance_meters(a: &Position, b: &Position) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `from` to `to` in degrees, `[0, 360)`, 0 = north.
///
/// Returns 0 when both positions are the same point.
#[must_use]
pub fn bearing_degrees(from: &Position, to: &Position) -> f64 {
    if from.same_point(to) {
        return 0.0;
    }

    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Signed shortest rotation from `current` to `target`, in `(-180, 180]`.
///
/// Positive values mean the target lies clockwise (to the right).
#[must_use]
pub fn angle_difference(target: f64, current: f64) -> f64 {
    let mut diff = target - current;
    while diff > 180.0 {
        diff -= 360.0;
    }
    while diff <= -180.0 {
        diff += 360.0;
    }
    diff
}

/// Map an angle difference onto an hour of a 12-hour clock face.
///
/// Anything within [`AHEAD_TOLERANCE_DEG`] of straight ahead is 12 o'clock;
/// otherwise each hour covers 30 degrees, with left-hand angles wrapping
/// onto 7-11.
#[must_use]
pub fn clock_direction(diff: f64) -> u8 {
    if diff.abs() < AHEAD_TOLERANCE_DEG {
        return 12;
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut hour = (diff / 30.0).round() as i64;
    if hour <= 0 {
        hour += 12;
    }
    // A normalized diff keeps hour in -6..=6, so the wrap lands in 1..=12.
    u8::try_from(hour.clamp(1, 12)).unwrap_or(12)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64) -> Position {
        Position::new(lat, lon, 0)
    }

    #[test]
    fn test_distance_zero_for_same_point() {
        let a = pos(37.5665, 126.9780);
        assert!(distance_meters(&a, &a).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (pos(37.5665, 126.9780), pos(37.5670, 126.9785)),
            (pos(-33.8688, 151.2093), pos(51.5074, -0.1278)),
            (pos(0.0, 179.9), pos(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert!((distance_meters(&a, &b) - distance_meters(&b, &a)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = distance_meters(&pos(0.0, 0.0), &pos(1.0, 0.0));
        // 2 * pi * 6371 km / 360
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_distance_short_walk() {
        let d = distance_meters(&pos(37.5665, 126.9780), &pos(37.5670, 126.9780));
        assert!((d - 55.6).abs() < 0.5, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = pos(0.0, 0.0);
        assert!(bearing_degrees(&origin, &pos(1.0, 0.0)).abs() < 0.1);
        assert!((bearing_degrees(&origin, &pos(0.0, 1.0)) - 90.0).abs() < 0.1);
        assert!((bearing_degrees(&origin, &pos(-1.0, 0.0)) - 180.0).abs() < 0.1);
        assert!((bearing_degrees(&origin, &pos(0.0, -1.0)) - 270.0).abs() < 0.1);
    }

    #[test]
    fn test_bearing_same_point_is_zero() {
        let a = pos(37.5665, 126.9780);
        assert!(bearing_degrees(&a, &a).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bearing_range() {
        let a = pos(37.5665, 126.9780);
        for i in 0..36 {
            let angle = f64::from(i) * 10.0_f64.to_radians();
            let b = pos(37.5665 + 0.001 * angle.cos(), 126.9780 + 0.001 * angle.sin());
            let bearing = bearing_degrees(&a, &b);
            assert!((0.0..360.0).contains(&bearing), "got {bearing}");
        }
    }

    #[test]
    fn test_angle_difference_range() {
        let mut target = -720.0;
        while target <= 720.0 {
            let mut current = -360.0;
            while current <= 360.0 {
                let diff = angle_difference(target, current);
                assert!(diff > -180.0 && diff <= 180.0, "{target} - {current} = {diff}");
                current += 37.5;
            }
            target += 12.5;
        }
    }

    #[test]
    fn test_angle_difference_self_is_zero() {
        for a in [0.0, 45.0, 180.0, 359.9, -90.0] {
            assert!(angle_difference(a, a).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_angle_difference_wraps() {
        assert!((angle_difference(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((angle_difference(350.0, 10.0) + 20.0).abs() < 1e-9);
        assert!((angle_difference(180.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((angle_difference(0.0, 180.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_clock_direction_ahead() {
        for diff in [0.0, 19.9, -19.9, 5.0, -5.0] {
            assert_eq!(clock_direction(diff), 12);
        }
    }

    #[test]
    fn test_clock_direction_hours() {
        assert_eq!(clock_direction(30.0), 1);
        assert_eq!(clock_direction(90.0), 3);
        assert_eq!(clock_direction(180.0), 6);
        assert_eq!(clock_direction(-90.0), 9);
        assert_eq!(clock_direction(-30.0), 11);
        assert_eq!(clock_direction(-179.0), 6);
        assert_eq!(clock_direction(20.0), 1);
        assert_eq!(clock_direction(-20.0), 11);
    }

    #[test]
    fn test_clock_direction_always_on_face() {
        let mut diff = -179.9;
        while diff <= 180.0 {
            let hour = clock_direction(diff);
            assert!((1..=12).contains(&hour), "{diff} -> {hour}");
            diff += 0.7;
        }
    }

    #[test]
    fn test_position_validate() {
        assert!(pos(37.5, 127.0).validate().is_ok());
        assert!(pos(90.0, 180.0).is_valid());
        assert!(!pos(f64::NAN, 0.0).is_valid());
        assert!(!pos(0.0, f64::INFINITY).is_valid());
        assert!(!pos(91.0, 0.0).is_valid());
        assert!(!pos(0.0, -180.5).is_valid());
    }

    #[test]
    fn test_position_time() {
        let p = Position::new(0.0, 0.0, 1_700_000_000_000);
        let time = p.time().unwrap();
        assert_eq!(time.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_position_deserialize_without_timestamp() {
        let p: Position = serde_json::from_str(r#"{"latitude": 37.5, "longitude": 127.0}"#).unwrap();
        assert_eq!(p.timestamp_ms, 0);
        assert!((p.latitude - 37.5).abs() < f64::EPSILON);
    }
}
