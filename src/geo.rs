//! Geographic primitives: coordinates and great-circle distance.
//!
//! Haversine is the straight-line fallback when no road-distance oracle is
//! reachable. Road distances are approximated as haversine times a fixed
//! road factor.

use serde::{Deserialize, Serialize};

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic point (latitude, longitude in degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two points in km.
pub fn haversine_km(from: Point, to: Point) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Estimated road distance in km: haversine scaled by the road factor.
pub fn road_km(from: Point, to: Point, road_factor: f64) -> f64 {
    haversine_km(from, to) * road_factor
}

/// Travel time in whole minutes for a road distance at an average speed.
pub fn travel_minutes(dist_km: f64, speed_kmh: f64) -> u32 {
    ((dist_km / speed_kmh) * 60.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let p = Point::new(43.7, -79.4);
        assert!(haversine_km(p, p) < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Toronto (43.65, -79.38) to Ottawa (45.42, -75.70)
        // Actual great-circle distance ~352 km
        let dist = haversine_km(Point::new(43.65, -79.38), Point::new(45.42, -75.70));
        assert!(dist > 330.0 && dist < 375.0, "Toronto to Ottawa should be ~352km, got {}", dist);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = Point::new(43.65, -79.38);
        let b = Point::new(44.38, -79.69);
        let d1 = haversine_km(a, b);
        let d2 = haversine_km(b, a);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_travel_minutes() {
        // 10 km at 40 km/h = 15 minutes
        assert_eq!(travel_minutes(10.0, 40.0), 15);
    }

    #[test]
    fn test_road_factor_scales() {
        let a = Point::new(43.65, -79.38);
        let b = Point::new(44.38, -79.69);
        let straight = haversine_km(a, b);
        let road = road_km(a, b, 1.3);
        assert!((road - straight * 1.3).abs() < 1e-9);
    }
}
