//! In-memory cache of fetched tables.
//!
//! Keyed by (location, date, method). A different date, method or location
//! is a different key, so those changes always miss; same-key entries expire
//! after the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use log::debug;

use super::types::{CalculationMethodId, DailyTimingTable};
use crate::location::{LocationKey, ResolvedLocation};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Everything that identifies one schedule request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    pub location: LocationKey,
    pub date: NaiveDate,
    pub method: CalculationMethodId,
}

/// A fetch to perform: the location value itself plus the rest of the key.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub location: ResolvedLocation,
    pub date: NaiveDate,
    pub method: CalculationMethodId,
}

impl ScheduleRequest {
    pub fn key(&self) -> ScheduleKey {
        ScheduleKey {
            location: self.location.key(),
            date: self.date,
            method: self.method,
        }
    }
}

struct CachedTable {
    stored_at: Instant,
    table: Arc<DailyTimingTable>,
}

pub struct ScheduleCache {
    ttl: Duration,
    entries: HashMap<ScheduleKey, CachedTable>,
}

impl Default for ScheduleCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ScheduleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &ScheduleKey, now: Instant) -> Option<Arc<DailyTimingTable>> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) >= self.ttl {
            debug!("Cache entry for {:?} expired", key);
            return None;
        }
        Some(entry.table.clone())
    }

    /// Stores a table and drops anything for other dates, which can no longer be asked for.
    pub fn insert(&mut self, key: ScheduleKey, table: Arc<DailyTimingTable>, now: Instant) {
        self.entries.retain(|k, _| k.date == key.date);
        self.entries.insert(key, CachedTable { stored_at: now, table });
    }

    /// Forgets every entry for `location`.
    pub fn invalidate_location(&mut self, location: &LocationKey) {
        let before = self.entries.len();
        self.entries.retain(|k, _| &k.location != location);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("Invalidated {} cached table(s) for {:?}", removed, location);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
