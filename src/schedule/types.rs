use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::location::Coordinates;

/// The six daily time points, in canonical order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Fajr,
        EventKind::Sunrise,
        EventKind::Dhuhr,
        EventKind::Asr,
        EventKind::Maghrib,
        EventKind::Isha,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            EventKind::Fajr => "Fajr",
            EventKind::Sunrise => "Sunrise",
            EventKind::Dhuhr => "Dhuhr",
            EventKind::Asr => "Asr",
            EventKind::Maghrib => "Maghrib",
            EventKind::Isha => "Isha",
        }
    }

    pub fn arabic_label(self) -> &'static str {
        match self {
            EventKind::Fajr => "الفجر",
            EventKind::Sunrise => "الشروق",
            EventKind::Dhuhr => "الظهر",
            EventKind::Asr => "العصر",
            EventKind::Maghrib => "المغرب",
            EventKind::Isha => "العشاء",
        }
    }

    /// Sunrise marks the end of Fajr's window; it is not itself a prayer.
    pub fn is_prayer(self) -> bool {
        self != EventKind::Sunrise
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Calculation methods
// ============================================================================

/// Provider-defined identifier of a juristic calculation convention.
///
/// Opaque to this crate: any value is forwarded as-is. [`KNOWN_METHODS`]
/// names the common ones.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CalculationMethodId(pub u8);

impl Default for CalculationMethodId {
    /// Umm al-Qura.
    fn default() -> Self {
        CalculationMethodId(4)
    }
}

impl fmt::Display for CalculationMethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct MethodInfo {
    pub id: CalculationMethodId,
    pub name: &'static str,
    pub arabic_name: &'static str,
}

pub const KNOWN_METHODS: &[MethodInfo] = &[
    MethodInfo { id: CalculationMethodId(4), name: "Umm Al-Qura", arabic_name: "أم القرى" },
    MethodInfo { id: CalculationMethodId(5), name: "Egyptian General Authority", arabic_name: "الهيئة المصرية" },
    MethodInfo { id: CalculationMethodId(2), name: "ISNA (North America)", arabic_name: "ISNA" },
    MethodInfo { id: CalculationMethodId(1), name: "University of Islamic Sciences, Karachi", arabic_name: "كراتشي" },
    MethodInfo { id: CalculationMethodId(3), name: "Muslim World League", arabic_name: "رابطة العالم الإسلامي" },
    MethodInfo { id: CalculationMethodId(7), name: "Institute of Geophysics, Tehran", arabic_name: "طهران" },
    MethodInfo { id: CalculationMethodId(0), name: "Shia Ithna-Ashari", arabic_name: "Shia Ithna-Ashari" },
];

impl CalculationMethodId {
    pub fn info(self) -> Option<&'static MethodInfo> {
        KNOWN_METHODS.iter().find(|m| m.id == self)
    }
}

// ============================================================================
// Date metadata
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HijriDate {
    pub day: u32,
    pub month: u32,
    pub month_name: String,
    pub month_name_ar: String,
    pub year: i32,
    pub weekday: String,
    pub weekday_ar: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GregorianDate {
    pub day: u32,
    pub month: u32,
    pub month_name: String,
    pub year: i32,
    pub weekday: String,
}

/// Calendar information the provider returns alongside the timings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DateInfo {
    pub hijri: HijriDate,
    pub gregorian: GregorianDate,
}

impl fmt::Display for HijriDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} AH", self.day, self.month_name, self.year)
    }
}

// ============================================================================
// Daily timing table
// ============================================================================

/// A timing table can't be built from these times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOrderError {
    pub earlier: EventKind,
    pub later: EventKind,
}

impl fmt::Display for TableOrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is scheduled before {}", self.later, self.earlier)
    }
}

impl std::error::Error for TableOrderError {}

/// One day's six event times for one place, in canonical order.
///
/// Fajr through Maghrib are non-decreasing. Isha may read earlier than
/// Maghrib, in which case it falls after midnight on the following day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DailyTimingTable {
    date: NaiveDate,
    times: [NaiveTime; 6],
    dates: Option<DateInfo>,
    timezone: Option<String>,
    coordinates: Option<Coordinates>,
}

impl DailyTimingTable {
    pub fn new(date: NaiveDate, times: [NaiveTime; 6]) -> Result<Self, TableOrderError> {
        for pair in EventKind::ALL[..5].windows(2) {
            let (earlier, later) = (pair[0], pair[1]);
            if times[later.index()] < times[earlier.index()] {
                return Err(TableOrderError { earlier, later });
            }
        }
        Ok(Self {
            date,
            times,
            dates: None,
            timezone: None,
            coordinates: None,
        })
    }

    pub fn with_dates(mut self, dates: DateInfo) -> Self {
        self.dates = Some(dates);
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// The calendar day these timings belong to.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time_of(&self, kind: EventKind) -> NaiveTime {
        self.times[kind.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (EventKind, NaiveTime)> + '_ {
        EventKind::ALL.iter().map(|&k| (k, self.time_of(k)))
    }

    /// Full local date-time of an event, placing a post-midnight Isha on the next day.
    pub fn scheduled_at(&self, kind: EventKind) -> NaiveDateTime {
        let time = self.time_of(kind);
        if kind == EventKind::Isha && time < self.time_of(EventKind::Maghrib) {
            return next_day(self.date).and_time(time);
        }
        self.date.and_time(time)
    }

    pub fn dates(&self) -> Option<&DateInfo> {
        self.dates.as_ref()
    }

    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Coordinates the provider computed the table for, when reported.
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }
}

/// Calendar successor, saturating at chrono's maximum date.
pub(crate) fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(NaiveDate::MAX)
}
