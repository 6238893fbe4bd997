//! # Actions
//!
//! Everything that can happen to the engine becomes an `Action`.
//! User asks for their location? That's `Action::RequestLocation`.
//! The timing provider answers? That's `Action::ScheduleFetched { .. }`.
//!
//! `update()` applies an action to the state and returns the side effects
//! the engine must carry out. No I/O here; anything time-dependent arrives
//! inside the action.
//!
//! ```text
//! State + Action  →  update()  →  New State + Vec<Effect>
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};

use crate::core::state::{EngineState, ScheduleSlot};
use crate::location::{Coordinates, LocationKey, PositionError, ResolveTicket, Transition};
use crate::qibla::{SensorStatus, bearing_from};
use crate::schedule::{
    CalculationMethodId, CountdownFrame, DailyTimingTable, EventKind, FetchError, ScheduleKey,
    ScheduleRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start an automatic position request.
    RequestLocation,
    PositionAcquired {
        ticket: ResolveTicket,
        outcome: Result<Coordinates, PositionError>,
        today: NaiveDate,
    },
    SubmitManual {
        city: String,
        country: String,
        today: NaiveDate,
    },
    SetMethod {
        method: CalculationMethodId,
        today: NaiveDate,
    },
    /// Re-issue the schedule fetch for the current location.
    RetrySchedule { today: NaiveDate },
    ScheduleFetched {
        request: ScheduleRequest,
        result: Result<Arc<DailyTimingTable>, FetchError>,
        /// Served from the cache rather than the network.
        cached: bool,
    },
    Tick(NaiveDateTime),
    HeadingChanged(f64),
    SensorChanged(SensorStatus),
    /// Leaving the screen: stop every background activity.
    Deactivate,
    /// Back on screen: resume the countdown from the kept table.
    Activate,
}

/// Work the engine performs after an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AcquirePosition(ResolveTicket),
    CancelPositionRequest,
    FetchSchedule(ScheduleRequest),
    CancelScheduleFetch,
    InvalidateCache(LocationKey),
    StoreSchedule {
        key: ScheduleKey,
        table: Arc<DailyTimingTable>,
    },
    StartTicker,
    StopTicker,
    StopHeading,
}

pub fn update(state: &mut EngineState, action: Action) -> Vec<Effect> {
    match action {
        Action::RequestLocation => {
            let ticket = state.resolver.begin_automatic();
            vec![Effect::AcquirePosition(ticket)]
        }

        Action::PositionAcquired {
            ticket,
            outcome,
            today,
        } => {
            let transition = state.resolver.complete_automatic(ticket, outcome);
            apply_location_transition(state, transition, today)
        }

        Action::SubmitManual {
            city,
            country,
            today,
        } => match state.resolver.submit_manual(&city, &country) {
            Ok(transition) => {
                let mut effects = vec![Effect::CancelPositionRequest];
                effects.extend(apply_location_transition(state, transition, today));
                effects
            }
            Err(e) => {
                warn!("Manual location rejected: {}", e);
                Vec::new()
            }
        },

        Action::SetMethod { method, today } => {
            if method == state.method {
                return Vec::new();
            }
            info!("Calculation method changed: {} -> {}", state.method, method);
            state.method = method;
            supersede_schedule(state, today)
        }

        Action::RetrySchedule { today } => {
            info!("Schedule retry requested");
            supersede_schedule(state, today)
        }

        Action::ScheduleFetched {
            request,
            result,
            cached,
        } => {
            let key = request.key();
            if state.pending.as_ref() != Some(&key) {
                debug!("Discarding stale schedule response for {}", request.location);
                return Vec::new();
            }
            state.pending = None;

            match result {
                Ok(table) => {
                    info!("Schedule ready for {} on {}", request.location, request.date);
                    if state.qibla.bearing_to_target.is_none()
                        && let Some(coords) = table.coordinates()
                    {
                        state.qibla.bearing_to_target = Some(bearing_from(coords));
                    }
                    state.schedule = ScheduleSlot::Ready {
                        request,
                        table: table.clone(),
                    };
                    state.ticking = true;
                    let mut effects = Vec::new();
                    if !cached {
                        effects.push(Effect::StoreSchedule { key, table });
                    }
                    effects.push(Effect::StartTicker);
                    effects
                }
                Err(error) => {
                    warn!("Schedule fetch failed for {}: {}", request.location, error);
                    state.schedule = ScheduleSlot::Failed { request, error };
                    state.countdown = None;
                    state.ticking = false;
                    vec![Effect::StopTicker]
                }
            }
        }

        Action::Tick(now) => {
            if !state.ticking {
                debug!("Ignoring tick while the ticker is stopped");
                return Vec::new();
            }
            let ScheduleSlot::Ready { request, table } = &state.schedule else {
                state.countdown = None;
                return Vec::new();
            };
            let frame = CountdownFrame::compute(table, now);
            // A post-midnight Isha keeps the old table current until it passes.
            let exhausted = frame.next.kind == EventKind::Fajr && frame.next.scheduled.date() > table.date();
            state.countdown = Some(frame);

            let today = now.date();
            if exhausted && today > request.date && state.pending.is_none() {
                info!("Calendar day changed to {}, refreshing schedule", today);
                let refresh = ScheduleRequest {
                    location: request.location.clone(),
                    date: today,
                    method: request.method,
                };
                state.pending = Some(refresh.key());
                return vec![Effect::FetchSchedule(refresh)];
            }
            Vec::new()
        }

        Action::HeadingChanged(heading) => {
            if state.sensor == SensorStatus::Subscribed {
                state.qibla.device_heading = Some(heading);
            }
            Vec::new()
        }

        Action::SensorChanged(status) => {
            debug!("Sensor status: {:?}", status);
            state.sensor = status;
            state.qibla.apply_sensor_status(status);
            Vec::new()
        }

        Action::Deactivate => {
            info!("Engine deactivated");
            state.resolver.cancel_pending();
            if state.schedule.is_loading() {
                state.schedule = ScheduleSlot::Empty;
            }
            state.pending = None;
            state.countdown = None;
            state.ticking = false;
            state.sensor = SensorStatus::Unchecked;
            state.qibla.apply_sensor_status(SensorStatus::Unchecked);
            vec![
                Effect::CancelPositionRequest,
                Effect::CancelScheduleFetch,
                Effect::StopTicker,
                Effect::StopHeading,
            ]
        }

        Action::Activate => {
            if state.ticking || state.schedule.table().is_none() {
                return Vec::new();
            }
            info!("Engine activated, resuming countdown");
            state.ticking = true;
            vec![Effect::StartTicker]
        }
    }
}

/// Reacts to the resolved location being replaced or cleared.
fn apply_location_transition(state: &mut EngineState, transition: Transition, today: NaiveDate) -> Vec<Effect> {
    match transition {
        Transition::Ignored => Vec::new(),
        Transition::Cleared { previous } => {
            state.schedule = ScheduleSlot::Empty;
            state.pending = None;
            state.countdown = None;
            state.ticking = false;
            state.qibla.bearing_to_target = None;
            let mut effects = vec![Effect::CancelScheduleFetch, Effect::StopTicker];
            if let Some(previous) = previous {
                effects.push(Effect::InvalidateCache(previous.key()));
            }
            effects
        }
        Transition::Replaced { previous } => {
            let current = state.resolver.location().map(|l| (l.key(), l.coordinates()));
            let mut effects = Vec::new();
            if let (Some(previous), Some((current_key, _))) = (previous, &current)
                && previous.key() != *current_key
            {
                effects.push(Effect::InvalidateCache(previous.key()));
            }
            state.qibla.bearing_to_target = current.and_then(|(_, coords)| coords).map(bearing_from);
            effects.extend(supersede_schedule(state, today));
            effects
        }
    }
}

/// Drops the current table and asks for a fresh one for the resolved location.
fn supersede_schedule(state: &mut EngineState, today: NaiveDate) -> Vec<Effect> {
    let Some(location) = state.resolver.location().cloned() else {
        return Vec::new();
    };
    let request = ScheduleRequest {
        location,
        date: today,
        method: state.method,
    };
    state.pending = Some(request.key());
    state.countdown = None;
    state.ticking = false;
    state.schedule = ScheduleSlot::Loading {
        request: request.clone(),
    };
    vec![Effect::StopTicker, Effect::FetchSchedule(request)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{LocationStatus, ResolvedLocation};
    use crate::test_support::{hm, london, sample_table};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn riyadh() -> ResolvedLocation {
        ResolvedLocation::PlaceName {
            city: "Riyadh".into(),
            country: "Saudi Arabia".into(),
        }
    }

    fn fetch_request(effects: &[Effect]) -> ScheduleRequest {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::FetchSchedule(r) => Some(r.clone()),
                _ => None,
            })
            .expect("expected a FetchSchedule effect")
    }

    /// Drives the state to Granted at London and returns the fetch it asked for.
    fn grant_london(state: &mut EngineState) -> ScheduleRequest {
        let effects = update(state, Action::RequestLocation);
        let Effect::AcquirePosition(ticket) = effects[0] else {
            panic!("expected AcquirePosition, got {:?}", effects);
        };
        let effects = update(
            state,
            Action::PositionAcquired {
                ticket,
                outcome: Ok(london()),
                today: today(),
            },
        );
        fetch_request(&effects)
    }

    fn deliver(state: &mut EngineState, request: ScheduleRequest) -> Vec<Effect> {
        let table = Arc::new(sample_table(request.date));
        update(
            state,
            Action::ScheduleFetched {
                request,
                result: Ok(table),
                cached: false,
            },
        )
    }

    #[test]
    fn test_granted_location_fetches_and_sets_bearing() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);

        assert_eq!(state.location_status(), LocationStatus::Granted);
        assert_eq!(request.location, ResolvedLocation::Coordinates(london()));
        assert_eq!(request.date, today());
        assert_eq!(request.method, CalculationMethodId::default());
        assert!(state.schedule.is_loading());
        assert!(state.is_loading());
        let bearing = state.qibla.bearing_to_target.unwrap();
        assert!((bearing - 118.99).abs() < 0.1);
    }

    #[test]
    fn test_fetched_schedule_becomes_ready_and_starts_ticker() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        let effects = deliver(&mut state, request.clone());

        assert!(matches!(effects[0], Effect::StoreSchedule { .. }));
        assert_eq!(effects[1], Effect::StartTicker);
        assert!(state.schedule.table().is_some());
        assert!(state.pending.is_none());
    }

    #[test]
    fn test_cached_delivery_is_not_stored_again() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        let effects = update(
            &mut state,
            Action::ScheduleFetched {
                request: request.clone(),
                result: Ok(Arc::new(sample_table(request.date))),
                cached: true,
            },
        );
        assert_eq!(effects, vec![Effect::StartTicker]);
    }

    #[test]
    fn test_stale_response_does_not_overwrite_newer_location() {
        let mut state = EngineState::default();
        let request_a = grant_london(&mut state);

        let effects = update(
            &mut state,
            Action::SubmitManual {
                city: "Riyadh".into(),
                country: "Saudi Arabia".into(),
                today: today(),
            },
        );
        let request_b = fetch_request(&effects);
        deliver(&mut state, request_b.clone());

        // A's response shows up late.
        let effects = deliver(&mut state, request_a);
        assert!(effects.is_empty());
        match &state.schedule {
            ScheduleSlot::Ready { request, .. } => assert_eq!(request.location, riyadh()),
            other => panic!("expected Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_response_while_loading_is_ignored() {
        let mut state = EngineState::default();
        let request_a = grant_london(&mut state);
        update(
            &mut state,
            Action::SubmitManual {
                city: "Riyadh".into(),
                country: "Saudi Arabia".into(),
                today: today(),
            },
        );
        deliver(&mut state, request_a);
        assert!(state.schedule.is_loading());
        assert!(state.pending.is_some());
    }

    #[test]
    fn test_manual_replaces_coordinates_and_invalidates_cache() {
        let mut state = EngineState::default();
        grant_london(&mut state);
        let effects = update(
            &mut state,
            Action::SubmitManual {
                city: "Riyadh".into(),
                country: "Saudi Arabia".into(),
                today: today(),
            },
        );
        assert_eq!(effects[0], Effect::CancelPositionRequest);
        assert!(effects.contains(&Effect::InvalidateCache(
            ResolvedLocation::Coordinates(london()).key()
        )));
        assert_eq!(state.location_status(), LocationStatus::Manual);
        assert_eq!(state.location(), Some(&riyadh()));
        // No coordinates for a place name until the provider reports them.
        assert!(state.qibla.bearing_to_target.is_none());
    }

    #[test]
    fn test_rejected_manual_entry_changes_nothing() {
        let mut state = EngineState::default();
        let effects = update(
            &mut state,
            Action::SubmitManual {
                city: String::new(),
                country: "X".into(),
                today: today(),
            },
        );
        assert!(effects.is_empty());
        assert_eq!(state.location_status(), LocationStatus::Idle);
    }

    #[test]
    fn test_place_name_bearing_comes_from_provider_coordinates() {
        let mut state = EngineState::default();
        let effects = update(
            &mut state,
            Action::SubmitManual {
                city: "London".into(),
                country: "UK".into(),
                today: today(),
            },
        );
        let request = fetch_request(&effects);
        let table = Arc::new(sample_table(today()).with_coordinates(london()));
        update(
            &mut state,
            Action::ScheduleFetched {
                request,
                result: Ok(table),
                cached: false,
            },
        );
        assert!(state.qibla.bearing_to_target.is_some());
    }

    #[test]
    fn test_denied_clears_location_and_schedule() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        deliver(&mut state, request);

        let effects = update(&mut state, Action::RequestLocation);
        let Effect::AcquirePosition(ticket) = effects[0] else {
            panic!("expected AcquirePosition");
        };
        let effects = update(
            &mut state,
            Action::PositionAcquired {
                ticket,
                outcome: Err(PositionError::Timeout),
                today: today(),
            },
        );
        assert!(effects.contains(&Effect::StopTicker));
        assert_eq!(state.location_status(), LocationStatus::Denied);
        assert!(state.location().is_none());
        assert_eq!(state.schedule, ScheduleSlot::Empty);
        assert!(state.qibla.bearing_to_target.is_none());
    }

    #[test]
    fn test_fetch_failure_stops_ticker_and_is_retryable() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        let effects = update(
            &mut state,
            Action::ScheduleFetched {
                request,
                result: Err(FetchError::Api { status: 503, message: "down".into() }),
                cached: false,
            },
        );
        assert_eq!(effects, vec![Effect::StopTicker]);
        assert!(state.schedule.error().is_some_and(FetchError::is_retryable));

        let effects = update(&mut state, Action::RetrySchedule { today: today() });
        assert_eq!(fetch_request(&effects).location, ResolvedLocation::Coordinates(london()));
        assert!(state.schedule.is_loading());
    }

    #[test]
    fn test_method_change_refetches_only_when_different() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        deliver(&mut state, request);

        let same = update(
            &mut state,
            Action::SetMethod { method: CalculationMethodId::default(), today: today() },
        );
        assert!(same.is_empty());

        let effects = update(
            &mut state,
            Action::SetMethod { method: CalculationMethodId(2), today: today() },
        );
        assert_eq!(fetch_request(&effects).method, CalculationMethodId(2));
        assert!(state.schedule.table().is_none());
    }

    #[test]
    fn test_tick_computes_countdown() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        deliver(&mut state, request);

        let effects = update(&mut state, Action::Tick(today().and_time(hm(10, 58)) + chrono::Duration::seconds(59)));
        assert!(effects.is_empty());
        let frame = state.countdown.clone().unwrap();
        assert_eq!(frame.next.kind, EventKind::Dhuhr);
        assert_eq!(frame.display, "01:01:01");
    }

    #[test]
    fn test_tick_without_table_clears_countdown() {
        let mut state = EngineState::default();
        update(&mut state, Action::Tick(today().and_time(hm(10, 0))));
        assert!(state.countdown.is_none());
    }

    #[test]
    fn test_new_day_triggers_single_refresh() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        deliver(&mut state, request);

        let tomorrow = today().succ_opt().unwrap();
        let effects = update(&mut state, Action::Tick(tomorrow.and_time(hm(0, 0))));
        let refresh = fetch_request(&effects);
        assert_eq!(refresh.date, tomorrow);
        // Old table keeps counting down to tomorrow's Fajr meanwhile.
        assert_eq!(state.countdown.as_ref().map(|f| f.next.kind), Some(EventKind::Fajr));

        let effects = update(&mut state, Action::Tick(tomorrow.and_time(hm(0, 1))));
        assert!(effects.is_empty());

        deliver(&mut state, refresh);
        assert_eq!(state.schedule.table().map(|t| t.date()), Some(tomorrow));
    }

    #[test]
    fn test_post_midnight_isha_delays_refresh_until_it_passes() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        let times = [hm(2, 30), hm(4, 40), hm(13, 10), hm(17, 30), hm(21, 35), hm(0, 20)];
        let table = Arc::new(DailyTimingTable::new(request.date, times).unwrap());
        update(
            &mut state,
            Action::ScheduleFetched {
                request,
                result: Ok(table),
                cached: false,
            },
        );

        let tomorrow = today().succ_opt().unwrap();
        let effects = update(&mut state, Action::Tick(tomorrow.and_time(hm(0, 5))));
        assert!(effects.is_empty());
        let frame = state.countdown.clone().unwrap();
        assert_eq!(frame.next.kind, EventKind::Isha);
        assert_eq!(frame.display, "00:15:00");
        assert!(state.pending.is_none());

        let effects = update(&mut state, Action::Tick(tomorrow.and_time(hm(0, 21))));
        assert_eq!(fetch_request(&effects).date, tomorrow);
        assert_eq!(state.countdown.as_ref().map(|f| f.next.kind), Some(EventKind::Fajr));
    }

    #[test]
    fn test_heading_only_applies_while_subscribed() {
        let mut state = EngineState::default();
        update(&mut state, Action::HeadingChanged(45.0));
        assert!(state.qibla.device_heading.is_none());

        update(&mut state, Action::SensorChanged(SensorStatus::Subscribed));
        update(&mut state, Action::HeadingChanged(45.0));
        assert_eq!(state.qibla.device_heading, Some(45.0));
        assert!(state.qibla.permission_granted);

        update(&mut state, Action::SensorChanged(SensorStatus::Denied));
        assert!(state.qibla.device_heading.is_none());
    }

    #[test]
    fn test_deactivate_stops_everything() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        deliver(&mut state, request);
        update(&mut state, Action::Tick(today().and_time(hm(9, 0))));
        update(&mut state, Action::RequestLocation);

        let effects = update(&mut state, Action::Deactivate);
        assert!(effects.contains(&Effect::StopTicker));
        assert!(effects.contains(&Effect::StopHeading));
        assert!(effects.contains(&Effect::CancelPositionRequest));
        assert!(state.countdown.is_none());
        assert_eq!(state.location_status(), LocationStatus::Granted);
        assert!(state.schedule.table().is_some());
    }

    #[test]
    fn test_queued_tick_after_deactivate_is_ignored() {
        let mut state = EngineState::default();
        let request = grant_london(&mut state);
        deliver(&mut state, request);
        update(&mut state, Action::Deactivate);
        assert!(!state.ticking);

        let tomorrow = today().succ_opt().unwrap();
        let effects = update(&mut state, Action::Tick(tomorrow.and_time(hm(0, 1))));
        assert!(effects.is_empty());
        assert!(state.countdown.is_none());
        assert!(state.pending.is_none());
    }

    #[test]
    fn test_activate_resumes_ticker_from_kept_table() {
        let mut state = EngineState::default();
        assert!(update(&mut state, Action::Activate).is_empty());

        let request = grant_london(&mut state);
        deliver(&mut state, request);
        // Already ticking.
        assert!(update(&mut state, Action::Activate).is_empty());

        update(&mut state, Action::Deactivate);
        assert_eq!(update(&mut state, Action::Activate), vec![Effect::StartTicker]);
        assert!(state.ticking);
        update(&mut state, Action::Tick(today().and_time(hm(11, 0))));
        assert_eq!(state.countdown.as_ref().map(|f| f.display.as_str()), Some("01:00:00"));
    }
}
