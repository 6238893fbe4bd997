//! Combines the static qibla bearing with the live device heading.

use serde::Serialize;

use super::bearing::normalize_degrees;

/// Rotation to apply to a qibla indicator.
///
/// When `live` is false there was no heading, and `degrees` is the bearing
/// from true north: the caller must present it as such (e.g. "turn to 119°
/// from north") rather than as a device-relative pointer.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRotation {
    pub degrees: f64,
    pub live: bool,
}

pub fn indicator_rotation(bearing_to_target: f64, device_heading: Option<f64>) -> IndicatorRotation {
    match device_heading {
        Some(heading) => IndicatorRotation {
            degrees: normalize_degrees((bearing_to_target - heading + 360.0) % 360.0),
            live: true,
        },
        None => IndicatorRotation {
            degrees: bearing_to_target,
            live: false,
        },
    }
}

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
];

/// Nearest of the 16 compass points.
pub fn compass_point(degrees: f64) -> &'static str {
    let sector = (normalize_degrees(degrees) / 22.5).round() as usize % 16;
    COMPASS_POINTS[sector]
}
