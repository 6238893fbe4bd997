//! # Engine
//!
//! Owns one [`EngineState`], the action channel, and every background task
//! the state asks for. All mutation goes through `update()`; the engine only
//! carries out the returned effects.
//!
//! ```text
//!  caller ──┐                       ┌── position task ──┐
//!           ▼                       │                   │
//!       dispatch(Action) ─ update ─ effects ─ fetch task ┼──▶ Action channel
//!           ▲                       │                   │        │
//!           │                       └── ticker / heading┘        │
//!           └─────────────────── next_update() ◀─────────────────┘
//! ```
//!
//! Background results never touch the state directly. They come back as
//! actions and are applied on the owner's task, one at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;

use crate::core::action::{Action, Effect, update};
use crate::core::state::{EngineState, ScheduleSlot};
use crate::location::{LocationStatus, ManualEntryError, PositionProvider, acquire_position, validate_manual};
use crate::location::resolver::DEFAULT_POSITION_TIMEOUT;
use crate::qibla::{HeadingSensorAdapter, OrientationPlatform, SensorCapability, SensorStatus};
use crate::schedule::cache::DEFAULT_CACHE_TTL;
use crate::schedule::countdown::TICK_PERIOD;
use crate::schedule::{CalculationMethodId, Clock, CountdownTicker, ScheduleCache, ScheduleProvider, ScheduleRequest};

/// The outside world the engine talks to.
pub struct EngineDeps {
    pub position: Arc<dyn PositionProvider>,
    pub schedule: Arc<dyn ScheduleProvider>,
    pub orientation: Arc<dyn OrientationPlatform>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub position_timeout: Duration,
    pub cache_ttl: Duration,
    pub tick_period: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            position_timeout: DEFAULT_POSITION_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            tick_period: TICK_PERIOD,
        }
    }
}

pub struct Engine {
    state: EngineState,
    deps: EngineDeps,
    settings: EngineSettings,
    cache: ScheduleCache,
    tx: UnboundedSender<Action>,
    rx: UnboundedReceiver<Action>,
    ticker: Option<CountdownTicker>,
    heading: HeadingSensorAdapter,
    position_task: Option<AbortHandle>,
    fetch_task: Option<AbortHandle>,
}

impl Engine {
    pub fn new(deps: EngineDeps, settings: EngineSettings, method: CalculationMethodId) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        info!(
            "Engine created (position: {}, schedule: {}, method {})",
            deps.position.name(),
            deps.schedule.name(),
            method
        );
        Self {
            state: EngineState::new(method),
            deps,
            cache: ScheduleCache::new(settings.cache_ttl),
            settings,
            tx,
            rx,
            ticker: None,
            heading: HeadingSensorAdapter::new(),
            position_task: None,
            fetch_task: None,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(CountdownTicker::is_running)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub fn request_location(&mut self) {
        self.dispatch(Action::RequestLocation);
    }

    /// Rejected entries return the error and leave the state untouched.
    pub fn submit_manual(&mut self, city: &str, country: &str) -> Result<(), ManualEntryError> {
        let (city, country) = validate_manual(city, country)?;
        let today = self.today();
        self.dispatch(Action::SubmitManual {
            city: city.to_string(),
            country: country.to_string(),
            today,
        });
        Ok(())
    }

    pub fn set_method(&mut self, method: CalculationMethodId) {
        let today = self.today();
        self.dispatch(Action::SetMethod { method, today });
    }

    pub fn retry_schedule(&mut self) {
        let today = self.today();
        self.dispatch(Action::RetrySchedule { today });
    }

    /// Negotiates the heading sensor and starts forwarding headings.
    pub async fn activate_heading(&mut self) -> SensorStatus {
        if let SensorCapability::Present {
            requires_permission: true,
            ..
        } = self.deps.orientation.capability()
        {
            self.dispatch(Action::SensorChanged(SensorStatus::RequestingPermission));
        }
        let tx = self.tx.clone();
        let status = self
            .heading
            .activate(self.deps.orientation.as_ref(), move |heading| {
                tx.send(Action::HeadingChanged(heading)).is_ok()
            })
            .await;
        self.dispatch(Action::SensorChanged(status));
        status
    }

    /// Cancels every in-flight request and stops the ticker and the sensor.
    pub fn deactivate(&mut self) {
        self.dispatch(Action::Deactivate);
    }

    /// Restarts the countdown from the table kept across `deactivate`.
    /// Does nothing without a ready table.
    pub fn activate(&mut self) {
        self.dispatch(Action::Activate);
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Waits for the next background result and applies it.
    pub async fn next_update(&mut self) -> &EngineState {
        // The engine holds a sender itself, so the channel never closes.
        if let Some(action) = self.rx.recv().await {
            self.dispatch(action);
        }
        &self.state
    }

    /// Applies every result that has already arrived, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(action) = self.rx.try_recv() {
            self.dispatch(action);
            applied += 1;
        }
        applied
    }

    /// Runs the event loop until `done` holds for the state.
    pub async fn run_until<F>(&mut self, done: F)
    where
        F: Fn(&EngineState) -> bool,
    {
        while !done(&self.state) {
            self.next_update().await;
        }
    }

    /// Tries automatic resolution; if that ends `Denied`, falls back to `place`.
    pub async fn resolve_with_fallback(&mut self, place: Option<(String, String)>) -> LocationStatus {
        self.request_location();
        self.run_until(|s| s.location_status() != LocationStatus::Resolving)
            .await;

        if self.state.location_status() == LocationStatus::Denied {
            match place {
                Some((city, country)) => {
                    info!("Automatic location denied, falling back to {}, {}", city, country);
                    if let Err(e) = self.submit_manual(&city, &country) {
                        warn!("Configured fallback place rejected: {}", e);
                    }
                }
                None => warn!("Automatic location denied and no fallback place configured"),
            }
        }
        self.state.location_status()
    }

    /// Waits until no schedule fetch is outstanding and returns the slot.
    pub async fn settle_schedule(&mut self) -> &ScheduleSlot {
        self.run_until(|s| s.pending.is_none()).await;
        &self.state.schedule
    }

    // ========================================================================
    // Effects
    // ========================================================================

    fn today(&self) -> chrono::NaiveDate {
        self.deps.clock.now().date()
    }

    fn dispatch(&mut self, action: Action) {
        let effects = update(&mut self.state, action);
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::AcquirePosition(ticket) => {
                abort(&mut self.position_task);
                let provider = self.deps.position.clone();
                let clock = self.deps.clock.clone();
                let timeout = self.settings.position_timeout;
                let tx = self.tx.clone();
                let handle = tokio::spawn(async move {
                    let outcome = acquire_position(provider.as_ref(), timeout).await;
                    let today = clock.now().date();
                    if tx
                        .send(Action::PositionAcquired { ticket, outcome, today })
                        .is_err()
                    {
                        debug!("Position result dropped: engine gone");
                    }
                });
                self.position_task = Some(handle.abort_handle());
            }
            Effect::CancelPositionRequest => abort(&mut self.position_task),
            Effect::FetchSchedule(request) => self.spawn_fetch(request),
            Effect::CancelScheduleFetch => abort(&mut self.fetch_task),
            Effect::InvalidateCache(location) => self.cache.invalidate_location(&location),
            Effect::StoreSchedule { key, table } => self.cache.insert(key, table, Instant::now()),
            Effect::StartTicker => {
                let tx = self.tx.clone();
                self.ticker = Some(CountdownTicker::start(
                    self.deps.clock.clone(),
                    self.settings.tick_period,
                    move |now| tx.send(Action::Tick(now)).is_ok(),
                ));
            }
            Effect::StopTicker => {
                self.ticker = None;
            }
            Effect::StopHeading => self.heading.deactivate(),
        }
    }

    fn spawn_fetch(&mut self, request: ScheduleRequest) {
        abort(&mut self.fetch_task);

        if let Some(table) = self.cache.get(&request.key(), Instant::now()) {
            debug!("Cache hit for {} on {}", request.location, request.date);
            if self
                .tx
                .send(Action::ScheduleFetched {
                    request,
                    result: Ok(table),
                    cached: true,
                })
                .is_err()
            {
                debug!("Cached schedule dropped: engine gone");
            }
            return;
        }

        let provider = self.deps.schedule.clone();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let result = provider
                .fetch(&request.location, request.date, request.method)
                .await
                .map(Arc::new);
            if tx
                .send(Action::ScheduleFetched {
                    request,
                    result,
                    cached: false,
                })
                .is_err()
            {
                debug!("Schedule result dropped: engine gone");
            }
        });
        self.fetch_task = Some(handle.abort_handle());
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        abort(&mut self.position_task);
        abort(&mut self.fetch_task);
    }
}

fn abort(task: &mut Option<AbortHandle>) {
    if let Some(handle) = task.take() {
        handle.abort();
    }
}
