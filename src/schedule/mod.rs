pub mod cache;
pub mod client;
pub mod countdown;
pub mod selector;
pub mod types;

pub use cache::{ScheduleCache, ScheduleKey, ScheduleRequest};
pub use client::{FetchError, PrayerScheduleClient, ScheduleProvider};
pub use countdown::{Clock, CountdownFrame, CountdownTicker, SystemClock};
pub use selector::{NextEvent, format_countdown, select_next};
pub use types::{
    CalculationMethodId, DailyTimingTable, DateInfo, EventKind, GregorianDate, HijriDate,
    KNOWN_METHODS, MethodInfo,
};
