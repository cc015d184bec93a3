//! Great-circle helpers for GPS tracking.
//!
//! All functions take WGS84 degrees and work on a spherical Earth of radius
//! 6,371 km, which is accurate to well under a percent at ride scale.

use geo::{Distance, Haversine, Point};

use crate::types::GeoPoint;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula).
#[inline]
pub fn haversine_distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let p1 = Point::new(a.longitude, a.latitude);
    let p2 = Point::new(b.longitude, b.latitude);
    Haversine::distance(p1, p2)
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360).
pub fn initial_bearing_deg(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let numerator = d_lon.sin() * lat_b.cos();
    let denominator = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();
    let bearing = numerator.atan2(denominator).to_degrees();
    (bearing + 360.0) % 360.0
}

/// Speed implied by moving from `a` to `b` in `dt_s` seconds, in km/h.
/// Returns 0 for a non-positive time delta; the caller decides what a
/// degenerate delta means.
pub fn implied_speed_kmh(a: &GeoPoint, b: &GeoPoint, dt_s: f64) -> f64 {
    if dt_s <= 0.0 {
        return 0.0;
    }
    haversine_distance_m(a, b) / dt_s * 3.6
}

/// Point reached from `origin` after `distance_m` meters along a constant
/// initial bearing. Used by the straight-line router and the synthetic feed.
pub fn destination_point(origin: &GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();
    let bearing = bearing_deg.to_radians();
    let angular = distance_m / EARTH_RADIUS_M;

    let lat2 =
        (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}
