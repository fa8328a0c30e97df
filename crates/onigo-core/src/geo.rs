//! Great-circle geometry over WGS84 lat/lng degrees.

/// Mean Earth radius in meters, matching the value every client must use so
/// that membership and capture tests agree across devices.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters.
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Whether a point lies within `radius_m` of the area center. The boundary
/// itself counts as inside.
pub fn is_inside_area(lat: f64, lng: f64, center_lat: f64, center_lng: f64, radius_m: f64) -> bool {
    distance_m(lat, lng, center_lat, center_lng) <= radius_m
}
