//! Great-circle distance over a spherical Earth.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in miles.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Haversine great-circle distance between two coordinates, in miles.
pub fn haversine_miles(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp: rounding can push h a hair past 1 for near-antipodal points.
    2.0 * h.min(1.0).sqrt().asin() * EARTH_RADIUS_MILES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_of_latitude_is_about_69_miles() {
        let a = Coordinate {
            latitude: 0.0,
            longitude: 0.0,
        };
        let b = Coordinate {
            latitude: 1.0,
            longitude: 0.0,
        };
        let d = haversine_miles(a, b);
        assert!((d - 69.0).abs() < 0.2, "got {d}");
    }

    #[test]
    fn self_distance_is_zero() {
        let boston = Coordinate {
            latitude: 42.3601,
            longitude: -71.0589,
        };
        assert_eq!(haversine_miles(boston, boston), 0.0);
    }
}
