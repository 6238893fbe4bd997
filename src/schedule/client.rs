//! Daily timing table fetcher.
//!
//! Talks to an Aladhan-compatible HTTP API. Two read-only endpoints, picked
//! by the shape of the [`ResolvedLocation`]:
//!
//! - `GET {base}/timings/{DD-MM-YYYY}?latitude=..&longitude=..&method=..`
//! - `GET {base}/timingsByCity/{DD-MM-YYYY}?city=..&country=..&method=..`
//!
//! Both answer with the six event times plus Hijri/Gregorian metadata.

use std::fmt;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use log::{debug, info, warn};
use serde::Deserialize;

use super::types::{
    CalculationMethodId, DailyTimingTable, DateInfo, EventKind, GregorianDate, HijriDate,
};
use crate::location::{Coordinates, ResolvedLocation};

pub const DEFAULT_TIMINGS_BASE_URL: &str = "https://api.aladhan.com/v1";

/// Errors that can occur while fetching a timing table.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Network-level failure (timeout, DNS, connection refused). Retryable.
    Network(String),
    /// The provider answered with a non-success status. Retryable if status >= 500 or 429.
    Api { status: u16, message: String },
    /// The payload could not be turned into a table. Not retryable.
    Parse(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Api { status, .. } => *status >= 500 || *status == 429,
            FetchError::Parse(_) => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {msg}"),
            FetchError::Api { status, message } => {
                write!(f, "timing provider error (HTTP {status}): {message}")
            }
            FetchError::Parse(msg) => write!(f, "malformed timing payload: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Fetches the table for `location` on `date` using calculation `method`.
    async fn fetch(
        &self,
        location: &ResolvedLocation,
        date: NaiveDate,
        method: CalculationMethodId,
    ) -> Result<DailyTimingTable, FetchError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize, Debug)]
struct Envelope {
    code: u16,
    #[serde(default)]
    status: String,
    data: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct DayPayload {
    timings: Timings,
    #[serde(default)]
    date: Option<DatePayload>,
    #[serde(default)]
    meta: Option<MetaPayload>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Timings {
    fajr: String,
    sunrise: String,
    dhuhr: String,
    asr: String,
    maghrib: String,
    isha: String,
}

#[derive(Deserialize, Debug)]
struct DatePayload {
    hijri: HijriPayload,
    gregorian: GregorianPayload,
}

#[derive(Deserialize, Debug)]
struct HijriPayload {
    day: String,
    weekday: Weekday,
    month: Month,
    year: String,
}

#[derive(Deserialize, Debug)]
struct GregorianPayload {
    day: String,
    weekday: Weekday,
    month: Month,
    year: String,
}

#[derive(Deserialize, Debug)]
struct Weekday {
    en: String,
    #[serde(default)]
    ar: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Month {
    number: u32,
    en: String,
    #[serde(default)]
    ar: Option<String>,
}

#[derive(Deserialize, Debug)]
struct MetaPayload {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    timezone: Option<String>,
}

// ============================================================================
// Translation Layer
// ============================================================================

/// Request path date segment, day first.
pub fn format_request_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Parses `"HH:MM"`, ignoring any trailing annotation such as `" (BST)"`.
fn parse_clock_time(raw: &str) -> Result<NaiveTime, FetchError> {
    let clock = raw.split_whitespace().next().unwrap_or_default();
    NaiveTime::parse_from_str(clock, "%H:%M")
        .map_err(|e| FetchError::Parse(format!("bad time '{raw}': {e}")))
}

fn parse_date_info(payload: DatePayload) -> Option<DateInfo> {
    let hijri = HijriDate {
        day: payload.hijri.day.parse().ok()?,
        month: payload.hijri.month.number,
        month_name: payload.hijri.month.en,
        month_name_ar: payload.hijri.month.ar.unwrap_or_default(),
        year: payload.hijri.year.parse().ok()?,
        weekday: payload.hijri.weekday.en,
        weekday_ar: payload.hijri.weekday.ar.unwrap_or_default(),
    };
    let gregorian = GregorianDate {
        day: payload.gregorian.day.parse().ok()?,
        month: payload.gregorian.month.number,
        month_name: payload.gregorian.month.en,
        year: payload.gregorian.year.parse().ok()?,
        weekday: payload.gregorian.weekday.en,
    };
    Some(DateInfo { hijri, gregorian })
}

/// Converts one day's payload into a table for `date`.
fn payload_to_table(payload: DayPayload, date: NaiveDate) -> Result<DailyTimingTable, FetchError> {
    let t = &payload.timings;
    let times = [
        parse_clock_time(&t.fajr)?,
        parse_clock_time(&t.sunrise)?,
        parse_clock_time(&t.dhuhr)?,
        parse_clock_time(&t.asr)?,
        parse_clock_time(&t.maghrib)?,
        parse_clock_time(&t.isha)?,
    ];

    let mut table =
        DailyTimingTable::new(date, times).map_err(|e| FetchError::Parse(e.to_string()))?;

    if let Some(date_payload) = payload.date {
        match parse_date_info(date_payload) {
            Some(info) => table = table.with_dates(info),
            None => warn!("Timing payload carried unreadable date metadata, ignoring it"),
        }
    }

    if let Some(meta) = payload.meta {
        if let Some(tz) = meta.timezone {
            table = table.with_timezone(tz);
        }
        if let (Some(lat), Some(lng)) = (meta.latitude, meta.longitude)
            && let Some(coords) = Coordinates::new(lat, lng)
        {
            table = table.with_coordinates(coords);
        }
    }

    Ok(table)
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the remote timing provider.
pub struct PrayerScheduleClient {
    base_url: String,
    client: reqwest::Client,
}

impl PrayerScheduleClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_TIMINGS_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request(
        &self,
        location: &ResolvedLocation,
        date: NaiveDate,
        method: CalculationMethodId,
    ) -> reqwest::RequestBuilder {
        let date_segment = format_request_date(date);
        let method = method.to_string();
        match location {
            ResolvedLocation::Coordinates(c) => self
                .client
                .get(format!("{}/timings/{}", self.base_url, date_segment))
                .query(&[
                    ("latitude", c.latitude.to_string()),
                    ("longitude", c.longitude.to_string()),
                    ("method", method),
                ]),
            ResolvedLocation::PlaceName { city, country } => self
                .client
                .get(format!("{}/timingsByCity/{}", self.base_url, date_segment))
                .query(&[
                    ("city", city.clone()),
                    ("country", country.clone()),
                    ("method", method),
                ]),
        }
    }
}

#[async_trait]
impl ScheduleProvider for PrayerScheduleClient {
    fn name(&self) -> &str {
        "aladhan"
    }

    async fn fetch(
        &self,
        location: &ResolvedLocation,
        date: NaiveDate,
        method: CalculationMethodId,
    ) -> Result<DailyTimingTable, FetchError> {
        info!("Fetching timings for {} on {} (method {})", location, date, method);

        let response = self
            .build_request(location, date, method)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        debug!("Timing provider response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Timing provider error: {} - {}", status, err_body);
            return Err(FetchError::Api {
                status,
                message: err_body,
            });
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        if envelope.code != 200 {
            warn!("Timing provider reported code {}: {}", envelope.code, envelope.status);
            return Err(FetchError::Api {
                status: envelope.code,
                message: envelope.data.to_string(),
            });
        }

        let payload: DayPayload =
            serde_json::from_value(envelope.data).map_err(|e| FetchError::Parse(e.to_string()))?;
        let table = payload_to_table(payload, date)?;
        info!("Timings received for {} ({} events)", date, EventKind::ALL.len());
        Ok(table)
    }
}
