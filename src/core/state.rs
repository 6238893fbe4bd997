//! # Engine State
//!
//! Everything the engine knows, in one owned value.
//!
//! ```text
//! EngineState
//! ├── resolver: LocationResolver        // status + resolved location
//! ├── method: CalculationMethodId       // current calculation convention
//! ├── schedule: ScheduleSlot            // Empty / Loading / Ready / Failed
//! ├── pending: Option<ScheduleKey>      // the only fetch result we will accept
//! ├── countdown: Option<CountdownFrame> // latest tick
//! ├── ticking: bool                     // ticks are only applied while set
//! ├── sensor: SensorStatus              // heading adapter progress
//! └── qibla: QiblaState                 // bearing + live heading
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! Fields are replaced as whole values, never patched piecemeal.

use std::sync::Arc;

use crate::location::{LocationResolver, LocationStatus, ResolvedLocation};
use crate::qibla::{QiblaState, SensorStatus};
use crate::schedule::{
    CalculationMethodId, CountdownFrame, DailyTimingTable, FetchError, ScheduleKey, ScheduleRequest,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScheduleSlot {
    /// No location yet, or the location was cleared.
    #[default]
    Empty,
    Loading { request: ScheduleRequest },
    Ready {
        request: ScheduleRequest,
        table: Arc<DailyTimingTable>,
    },
    /// Retryable by the caller; nothing retries automatically.
    Failed {
        request: ScheduleRequest,
        error: FetchError,
    },
}

impl ScheduleSlot {
    pub fn table(&self) -> Option<&Arc<DailyTimingTable>> {
        match self {
            ScheduleSlot::Ready { table, .. } => Some(table),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            ScheduleSlot::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ScheduleSlot::Loading { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub resolver: LocationResolver,
    pub method: CalculationMethodId,
    pub schedule: ScheduleSlot,
    pub pending: Option<ScheduleKey>,
    pub countdown: Option<CountdownFrame>,
    /// Set when `StartTicker` is issued, cleared with `StopTicker`.
    pub ticking: bool,
    pub sensor: SensorStatus,
    pub qibla: QiblaState,
}

impl EngineState {
    pub fn new(method: CalculationMethodId) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn location_status(&self) -> LocationStatus {
        self.resolver.status()
    }

    pub fn location(&self) -> Option<&ResolvedLocation> {
        self.resolver.location()
    }

    /// True while a location or schedule request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.resolver.status() == LocationStatus::Resolving || self.pending.is_some()
    }
}
