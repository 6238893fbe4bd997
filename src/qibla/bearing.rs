//! Great-circle initial bearing toward the Kaaba.

use crate::location::Coordinates;

/// The Kaaba, Makkah.
pub const KAABA: Coordinates = Coordinates {
    latitude: 21.4225,
    longitude: 39.8262,
};

/// Initial compass bearing, in degrees clockwise from true north within
/// [0, 360), from (`latitude`, `longitude`) toward [`KAABA`].
///
/// At the Kaaba itself the direction is undefined; the result is then
/// whatever `atan2` yields for a near-zero vector (0 or 180) and carries no
/// meaning, but it is always a finite angle in range.
pub fn qibla_bearing(latitude: f64, longitude: f64) -> f64 {
    debug_assert!(
        Coordinates::new(latitude, longitude).is_some(),
        "coordinates out of range: {latitude}, {longitude}"
    );

    let phi_k = KAABA.latitude.to_radians();
    let lambda_k = KAABA.longitude.to_radians();
    let phi = latitude.to_radians();
    let lambda = longitude.to_radians();
    let delta_lambda = lambda_k - lambda;

    let y = delta_lambda.sin();
    let x = phi.cos() * phi_k.tan() - phi.sin() * delta_lambda.cos();
    let angle = y.atan2(x).to_degrees();

    normalize_degrees(angle)
}

pub fn bearing_from(coordinates: Coordinates) -> f64 {
    qibla_bearing(coordinates.latitude, coordinates.longitude)
}

/// Folds any finite angle into [0, 360).
pub(crate) fn normalize_degrees(angle: f64) -> f64 {
    let folded = (angle % 360.0 + 360.0) % 360.0;
    // -1e-15 + 360 rounds to 360.0 exactly.
    if folded >= 360.0 { 0.0 } else { folded }
}
