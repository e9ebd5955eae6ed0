//! Great-circle distance between two coordinates (haversine)

use crate::domain::types::Coordinate;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters
///
/// Symmetric, zero for identical points, and NaN-free for any pair of valid
/// coordinates: the haversine term is clamped to [0, 1] so rounding near
/// antipodal points cannot push `sqrt(1 - a)` negative.
#[inline]
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    // abs() keeps the result bit-for-bit symmetric in its arguments
    let delta_phi = (b.latitude - a.latitude).abs().to_radians();
    let delta_lambda = (b.longitude - a.longitude).abs().to_radians();

    let sin_dphi = (delta_phi / 2.0).sin();
    let sin_dlambda = (delta_lambda / 2.0).sin();
    let h = (sin_dphi * sin_dphi + phi1.cos() * phi2.cos() * sin_dlambda * sin_dlambda)
        .clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}
