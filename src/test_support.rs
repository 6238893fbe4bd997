//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::location::{Coordinates, PositionError, PositionProvider, ResolvedLocation};
use crate::qibla::{
    HeadingConvention, OrientationPlatform, OrientationReading, PermissionOutcome, SensorCapability,
};
use crate::schedule::{CalculationMethodId, Clock, DailyTimingTable, FetchError, ScheduleProvider};

// ============================================================================
// Fixtures
// ============================================================================

pub fn london() -> Coordinates {
    Coordinates {
        latitude: 51.5074,
        longitude: -0.1278,
    }
}

/// What the stub provider reports back for a place name.
pub fn riyadh() -> Coordinates {
    Coordinates {
        latitude: 24.7136,
        longitude: 46.6753,
    }
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Fajr 05:00, Sunrise 06:20, Dhuhr 12:00, Asr 15:20, Maghrib 17:45, Isha 19:15.
pub fn sample_table(date: NaiveDate) -> DailyTimingTable {
    DailyTimingTable::new(
        date,
        [hm(5, 0), hm(6, 20), hm(12, 0), hm(15, 20), hm(17, 45), hm(19, 15)],
    )
    .unwrap()
}

// ============================================================================
// Position
// ============================================================================

pub struct ScriptedPosition {
    outcome: Option<Result<Coordinates, PositionError>>,
}

impl ScriptedPosition {
    pub fn returning(outcome: Result<Coordinates, PositionError>) -> Self {
        Self {
            outcome: Some(outcome),
        }
    }

    /// Never answers; only a timeout ends the request.
    pub fn hanging() -> Self {
        Self { outcome: None }
    }
}

#[async_trait]
impl PositionProvider for ScriptedPosition {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn current_position(&self) -> Result<Coordinates, PositionError> {
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => std::future::pending().await,
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// Serves `sample_table` for any request and counts calls.
#[derive(Default)]
pub struct StubSchedule {
    calls: AtomicUsize,
    failure: Mutex<Option<FetchError>>,
    coordinate_delay: Option<Duration>,
}

impl StubSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coordinate lookups answer only after `delay`; place names stay instant.
    pub fn slow_for_coordinates(delay: Duration) -> Self {
        Self {
            coordinate_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_with(&self, error: Option<FetchError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduleProvider for StubSchedule {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(
        &self,
        location: &ResolvedLocation,
        date: NaiveDate,
        _method: CalculationMethodId,
    ) -> Result<DailyTimingTable, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let ResolvedLocation::Coordinates(_) = location
            && let Some(delay) = self.coordinate_delay
        {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        let echoed = location.coordinates().unwrap_or_else(riyadh);
        Ok(sample_table(date).with_coordinates(echoed))
    }
}

// ============================================================================
// Clock
// ============================================================================

pub struct MutableClock {
    now: Mutex<NaiveDateTime>,
}

impl MutableClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for MutableClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Orientation
// ============================================================================

/// A sensor whose readings are pushed by the test.
pub struct ScriptedOrientation {
    convention: HeadingConvention,
    /// `None` = the platform needs no permission step.
    permission: Option<PermissionOutcome>,
    permission_requests: AtomicUsize,
    subscribers: Mutex<Vec<Sender<OrientationReading>>>,
}

impl ScriptedOrientation {
    pub fn new(convention: HeadingConvention, permission: Option<PermissionOutcome>) -> Self {
        Self {
            convention,
            permission,
            permission_requests: AtomicUsize::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub async fn emit(&self, reading: OrientationReading) {
        let subscribers: Vec<_> = self.subscribers.lock().unwrap().clone();
        for tx in subscribers {
            let _ = tx.send(reading).await;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrientationPlatform for ScriptedOrientation {
    fn capability(&self) -> SensorCapability {
        SensorCapability::Present {
            convention: self.convention,
            requires_permission: self.permission.is_some(),
        }
    }

    async fn request_permission(&self) -> PermissionOutcome {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.permission.unwrap_or(PermissionOutcome::Granted)
    }

    fn subscribe(&self) -> Receiver<OrientationReading> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}
