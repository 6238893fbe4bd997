//! # Heading Sensor Adapter
//!
//! Turns a platform's orientation events into one true-north heading.
//!
//! Platforms report heading one of two ways: an absolute compass field, or a
//! raw `alpha` angle that runs counter-clockwise. The platform declares which
//! one up front, and the adapter picks the matching [`HeadingNormalizer`] once
//! at activation instead of inspecting every event.
//!
//! ```text
//!   Unchecked ──capability absent──────────────────────▶ Unsupported
//!       │
//!       ├──no permission step──────────────────────────▶ Subscribed
//!       │
//!       └──permission needed──▶ RequestingPermission ──granted──▶ Subscribed
//!                                        └──refused───▶ Denied
//! ```

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

use super::bearing::normalize_degrees;

/// How a platform reports heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingConvention {
    /// Degrees clockwise from north, already absolute.
    AbsoluteCompass,
    /// Device-frame `alpha`, counter-clockwise; heading is `(360 - alpha) mod 360`.
    RawAlpha,
}

/// One raw orientation event. Either field may be missing on a given platform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationReading {
    pub compass_heading: Option<f64>,
    pub alpha: Option<f64>,
}

pub trait HeadingNormalizer: Send + Sync {
    /// Heading in [0, 360), or `None` if this event lacks the needed field.
    fn normalize(&self, reading: &OrientationReading) -> Option<f64>;
}

/// Prefers the compass field. Events that arrive without it fall back to `alpha`.
pub struct AbsoluteCompass;

impl HeadingNormalizer for AbsoluteCompass {
    fn normalize(&self, reading: &OrientationReading) -> Option<f64> {
        reading
            .compass_heading
            .filter(|h| h.is_finite())
            .map(normalize_degrees)
            .or_else(|| RawAlpha.normalize(reading))
    }
}

pub struct RawAlpha;

impl HeadingNormalizer for RawAlpha {
    fn normalize(&self, reading: &OrientationReading) -> Option<f64> {
        reading
            .alpha
            .filter(|a| a.is_finite())
            .map(|alpha| normalize_degrees((360.0 - alpha) % 360.0))
    }
}

pub fn normalizer_for(convention: HeadingConvention) -> Box<dyn HeadingNormalizer> {
    match convention {
        HeadingConvention::AbsoluteCompass => Box::new(AbsoluteCompass),
        HeadingConvention::RawAlpha => Box::new(RawAlpha),
    }
}

// ============================================================================
// Platform seam
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCapability {
    Absent,
    Present {
        convention: HeadingConvention,
        requires_permission: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Refused,
}

#[async_trait]
pub trait OrientationPlatform: Send + Sync {
    fn capability(&self) -> SensorCapability;

    /// Asks the user for sensor access. Platform errors count as `Refused`.
    async fn request_permission(&self) -> PermissionOutcome;

    /// Starts delivering orientation events. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Receiver<OrientationReading>;
}

/// A platform without any orientation sensor (desktops, servers).
pub struct NoOrientationSensor;

#[async_trait]
impl OrientationPlatform for NoOrientationSensor {
    fn capability(&self) -> SensorCapability {
        SensorCapability::Absent
    }

    async fn request_permission(&self) -> PermissionOutcome {
        PermissionOutcome::Refused
    }

    fn subscribe(&self) -> Receiver<OrientationReading> {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        rx
    }
}

/// A platform whose device always faces one direction; used for `--heading`.
pub struct FixedHeading {
    heading: f64,
}

impl FixedHeading {
    pub fn new(heading: f64) -> Self {
        Self { heading }
    }
}

#[async_trait]
impl OrientationPlatform for FixedHeading {
    fn capability(&self) -> SensorCapability {
        SensorCapability::Present {
            convention: HeadingConvention::AbsoluteCompass,
            requires_permission: false,
        }
    }

    async fn request_permission(&self) -> PermissionOutcome {
        PermissionOutcome::Granted
    }

    fn subscribe(&self) -> Receiver<OrientationReading> {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let reading = OrientationReading {
            compass_heading: Some(self.heading),
            alpha: None,
        };
        // Capacity 1 and a fresh channel: this cannot be full.
        let _ = tx.try_send(reading);
        rx
    }
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorStatus {
    #[default]
    Unchecked,
    RequestingPermission,
    Subscribed,
    Unsupported,
    Denied,
}

impl SensorStatus {
    /// Whether a live heading can still be expected.
    pub fn yields_heading(self) -> bool {
        matches!(self, SensorStatus::Subscribed | SensorStatus::RequestingPermission)
    }

    pub fn is_supported(self) -> bool {
        self != SensorStatus::Unsupported
    }
}

#[derive(Default)]
pub struct HeadingSensorAdapter {
    status: SensorStatus,
    task: Option<JoinHandle<()>>,
}

impl HeadingSensorAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    /// Negotiates access and, when allowed, forwards every normalized heading
    /// to `on_heading` until deactivated. `on_heading` returns `false` to stop.
    ///
    /// Re-activating replaces any existing subscription.
    pub async fn activate<F>(&mut self, platform: &dyn OrientationPlatform, on_heading: F) -> SensorStatus
    where
        F: FnMut(f64) -> bool + Send + 'static,
    {
        self.deactivate();

        let convention = match platform.capability() {
            SensorCapability::Absent => {
                info!("No orientation sensor; heading unavailable");
                self.status = SensorStatus::Unsupported;
                return self.status;
            }
            SensorCapability::Present {
                convention,
                requires_permission,
            } => {
                if requires_permission {
                    self.status = SensorStatus::RequestingPermission;
                    debug!("Requesting orientation permission");
                    if platform.request_permission().await == PermissionOutcome::Refused {
                        warn!("Orientation permission refused");
                        self.status = SensorStatus::Denied;
                        return self.status;
                    }
                }
                convention
            }
        };

        let normalizer = normalizer_for(convention);
        let mut readings = platform.subscribe();
        let mut on_heading = on_heading;
        self.task = Some(tokio::spawn(async move {
            while let Some(reading) = readings.recv().await {
                if let Some(heading) = normalizer.normalize(&reading)
                    && !on_heading(heading)
                {
                    break;
                }
            }
            debug!("Orientation stream ended");
        }));
        info!("Subscribed to orientation events ({:?})", convention);
        self.status = SensorStatus::Subscribed;
        self.status
    }

    /// Drops the subscription. Status returns to `Unchecked` if it was live.
    pub fn deactivate(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Unsubscribed from orientation events");
        }
        if self.status == SensorStatus::Subscribed {
            self.status = SensorStatus::Unchecked;
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for HeadingSensorAdapter {
    fn drop(&mut self) {
        self.deactivate();
    }
}
