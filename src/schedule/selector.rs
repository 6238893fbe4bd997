//! Picks the next event from a day's table.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::types::{DailyTimingTable, EventKind, next_day};

/// The upcoming event relative to some instant. Recomputed every tick.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextEvent {
    pub kind: EventKind,
    pub scheduled: NaiveDateTime,
    pub remaining_ms: i64,
}

/// Returns the first event strictly after `now`, or tomorrow's Fajr once Isha has passed.
///
/// Tomorrow's Fajr reuses today's clock time on the following calendar date.
pub fn select_next(table: &DailyTimingTable, now: NaiveDateTime) -> NextEvent {
    let (kind, scheduled) = EventKind::ALL
        .iter()
        .map(|&kind| (kind, table.scheduled_at(kind)))
        .find(|&(_, at)| at > now)
        .unwrap_or_else(|| {
            let fajr = table.time_of(EventKind::Fajr);
            (EventKind::Fajr, next_day(table.date()).and_time(fajr))
        });

    NextEvent {
        kind,
        scheduled,
        remaining_ms: (scheduled - now).num_milliseconds().max(0),
    }
}

/// Renders a remaining duration as zero-padded `HH:MM:SS`. Negative input reads as zero.
pub fn format_countdown(remaining_ms: i64) -> String {
    let total_seconds = remaining_ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
