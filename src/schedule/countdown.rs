//! # Countdown Ticker
//!
//! A 1 Hz loop that asks the clock for the time and hands it to a callback.
//! Nothing is decremented between ticks: every tick reads wall-clock time,
//! so clock adjustments correct themselves on the next one.
//!
//! The ticker owns its task. Dropping it (or calling [`CountdownTicker::stop`])
//! aborts the task, so no timer outlives its owner.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use log::debug;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::selector::{NextEvent, format_countdown, select_next};
use super::types::DailyTimingTable;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Source of "now" as a local wall-clock date-time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The device's local clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// What a countdown display needs for one tick.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CountdownFrame {
    pub next: NextEvent,
    pub display: String,
    pub observed_at: NaiveDateTime,
}

impl CountdownFrame {
    pub fn compute(table: &DailyTimingTable, now: NaiveDateTime) -> Self {
        let next = select_next(table, now);
        Self {
            display: format_countdown(next.remaining_ms),
            next,
            observed_at: now,
        }
    }
}

pub struct CountdownTicker {
    handle: Option<JoinHandle<()>>,
}

impl CountdownTicker {
    /// Starts ticking every `period`. The first tick fires immediately.
    ///
    /// `on_tick` returns `false` to end the loop (e.g. its receiver is gone).
    pub fn start<F>(clock: Arc<dyn Clock>, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(NaiveDateTime) -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !on_tick(clock.now()) {
                    debug!("Countdown ticker sink closed, stopping");
                    break;
                }
            }
        });
        debug!("Countdown ticker started ({:?})", period);
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Countdown ticker stopped");
        }
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
