pub mod bearing;
pub mod fusion;
pub mod heading;

use serde::Serialize;

pub use bearing::{KAABA, bearing_from, qibla_bearing};
pub use fusion::{IndicatorRotation, compass_point, indicator_rotation};
pub use heading::{
    FixedHeading, HeadingConvention, HeadingSensorAdapter, NoOrientationSensor, OrientationPlatform,
    OrientationReading, PermissionOutcome, SensorCapability, SensorStatus,
};

/// Everything a qibla display needs.
///
/// `bearing_to_target` is fixed per resolved location; `device_heading`
/// follows the sensor while subscribed.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct QiblaState {
    pub bearing_to_target: Option<f64>,
    pub device_heading: Option<f64>,
    pub permission_granted: bool,
    pub sensor_supported: bool,
}

impl QiblaState {
    /// `None` until a bearing is known.
    pub fn rotation(&self) -> Option<IndicatorRotation> {
        self.bearing_to_target
            .map(|bearing| indicator_rotation(bearing, self.device_heading))
    }

    pub(crate) fn apply_sensor_status(&mut self, status: SensorStatus) {
        self.sensor_supported = status.is_supported();
        self.permission_granted = status == SensorStatus::Subscribed;
        if !status.yields_heading() {
            self.device_heading = None;
        }
    }
}
