//! Geodesic helpers: great-circle distance, dead reckoning, heading
//! normalization.
//!
//! All functions are pure and total on their documented domains.

use crate::domain::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS-84 points, in meters.
pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Advance a position by dead reckoning.
///
/// Bearing convention: 0° is North and adds to latitude; 90° is East and
/// adds to longitude. This exact convention is load-bearing — replayed
/// trajectories must stay bit-compatible with recorded ones.
pub fn dead_reckon(from: &GeoPoint, heading_deg: f64, speed_mps: f64, dt_ms: i64) -> GeoPoint {
    let distance_m = speed_mps * dt_ms as f64 / 1000.0;
    if distance_m == 0.0 {
        return *from;
    }

    let heading_rad = heading_deg.to_radians();
    let angular = distance_m / EARTH_RADIUS_M;

    let d_lat = angular.to_degrees() * heading_rad.cos();
    let d_lng = angular.to_degrees() * heading_rad.sin() / from.lat.to_radians().cos();

    GeoPoint::new(from.lat + d_lat, from.lng + d_lng)
}

/// Normalize a heading into `[0, 360)`, tolerating negative inputs.
pub fn normalize_heading(heading_deg: f64) -> f64 {
    ((heading_deg % 360.0) + 360.0) % 360.0
}
