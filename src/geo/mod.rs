//! Great-circle geometry for position samples
//!
//! Distances use the haversine formula on a spherical earth. Offsets use a
//! local equirectangular projection, which is accurate for the tens to a few
//! hundred meters loot spawning works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A single position sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Horizontal accuracy radius in meters (0 when unknown or exact)
    pub accuracy: f64,
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// Create an exact position sampled now
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Set the horizontal accuracy radius
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Set the sample timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Great-circle distance to another position in meters
    pub fn distance_to(&self, other: &Position) -> f64 {
        distance(self, other)
    }
}

/// Haversine distance between two positions in meters
pub fn distance(p1: &Position, p2: &Position) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `from` towards `to`, in radians clockwise from north
/// and normalized to `[0, 2π)`.
pub fn bearing(from: &Position, to: &Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    y.atan2(x).rem_euclid(2.0 * PI)
}

/// Project a point `distance_m` meters away from `origin` along `bearing`
///
/// The longitude offset is scaled by `cos(latitude)` to account for meridian
/// convergence. Accuracy and timestamp are carried over from the origin.
pub fn offset(origin: &Position, bearing: f64, distance_m: f64) -> Position {
    let angular = distance_m / EARTH_RADIUS_M;
    let lat_cos = origin.latitude.to_radians().cos().abs().max(f64::EPSILON);

    let d_lat = (angular * bearing.cos()).to_degrees();
    let d_lon = (angular * bearing.sin() / lat_cos).to_degrees();

    Position {
        latitude: origin.latitude + d_lat,
        longitude: origin.longitude + d_lon,
        ..*origin
    }
}

/// Human-readable distance: whole meters below one kilometer, else kilometers
/// with one decimal
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Coordinates with six decimals, `"lat, lng"`
pub fn format_coordinates(position: &Position) -> String {
    format!("{:.6}, {:.6}", position.latitude, position.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = Position::new(48.8584, 2.2945);
        assert_eq!(distance(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Position::new(51.5007, -0.1246);
        let b = Position::new(51.5055, -0.0754);
        assert!((distance(&a, &b) - distance(&b, &a)).abs() < EPS);
    }

    #[test]
    fn test_distance_one_millidegree_at_equator() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(0.0, 0.0009);
        let d = distance(&a, &b);
        // 0.0009° of arc on the mean-radius sphere
        assert!((d - 100.0754).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_triangle_inequality() {
        let a = Position::new(40.7128, -74.0060);
        let b = Position::new(40.7138, -74.0010);
        let c = Position::new(40.7100, -74.0030);
        assert!(distance(&a, &c) <= distance(&a, &b) + distance(&b, &c) + EPS);
    }

    #[test]
    fn test_offset_north_matches_distance() {
        let origin = Position::new(37.7749, -122.4194);
        let p = offset(&origin, 0.0, 30.0);
        assert!(p.latitude > origin.latitude);
        assert!((distance(&origin, &p) - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_offset_east_scaled_by_latitude() {
        let origin = Position::new(60.0, 10.0);
        let p = offset(&origin, PI / 2.0, 40.0);
        assert!((p.latitude - origin.latitude).abs() < 1e-9);
        assert!((distance(&origin, &p) - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_bearing_cardinal() {
        let origin = Position::new(0.0, 0.0);
        let east = Position::new(0.0, 0.001);
        let north = Position::new(0.001, 0.0);
        assert!((bearing(&origin, &east) - PI / 2.0).abs() < 1e-6);
        assert!(bearing(&origin, &north).abs() < 1e-6);
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(42.4), "42m");
        assert_eq!(format_distance(999.4), "999m");
        assert_eq!(format_distance(1340.0), "1.3km");
    }

    #[test]
    fn test_format_coordinates() {
        let p = Position::new(1.5, -2.25);
        assert_eq!(format_coordinates(&p), "1.500000, -2.250000");
    }
}
