//! Time types for calendar events.
//!
//! This module provides [`CalendarTime`] for the raw value of a DTSTART/DTEND
//! property (a date, or a timestamp in one of three flavours), the rules that
//! turn it into a zone-aware instant, and [`TimeWindow`] for query ranges.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The value of an iCalendar date or date-time property.
///
/// Mirrors the forms RFC 5545 allows for DTSTART/DTEND:
/// - **Date**: `VALUE=DATE`, no time of day
/// - **Utc**: a timestamp with the `Z` suffix
/// - **Floating**: a timestamp without zone information
/// - **Zoned**: a timestamp with a `TZID` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CalendarTime {
    /// A date without a time of day.
    Date(NaiveDate),
    /// A UTC timestamp.
    Utc(DateTime<Utc>),
    /// A timestamp without zone information.
    Floating(NaiveDateTime),
    /// A local timestamp in the named zone.
    Zoned {
        /// Wall-clock time in `tzid`.
        date_time: NaiveDateTime,
        /// IANA zone identifier from the TZID parameter.
        tzid: String,
    },
}

impl CalendarTime {
    /// Converts this value into a zone-aware instant.
    ///
    /// Dates become midnight UTC. Timestamps are expressed in `local`:
    /// floating timestamps are read as wall-clock time in `local`, zoned ones
    /// are resolved through their TZID (falling back to `local` when the
    /// identifier is unknown).
    pub fn to_instant(&self, local: Tz) -> DateTime<Tz> {
        match self {
            Self::Date(date) => midnight_utc(*date),
            Self::Utc(dt) => dt.with_timezone(&local),
            Self::Floating(naive) => resolve_local(&local, naive),
            Self::Zoned { date_time, tzid } => {
                let zone = tzid.parse::<Tz>().unwrap_or_else(|_| {
                    warn!(tzid = %tzid, fallback = %local.name(), "Unknown TZID, using local zone");
                    local
                });
                resolve_local(&zone, date_time).with_timezone(&local)
            }
        }
    }
}

/// Returns midnight UTC at the start of `date`.
pub fn midnight_utc(date: NaiveDate) -> DateTime<Tz> {
    Tz::UTC.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Maps a wall-clock time onto `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap are moved forward by one hour.
pub fn resolve_local(tz: &Tz, naive: &NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(*naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(naive))
}

/// Re-labels the wall-clock reading of `now` in `local` with `target`'s zone.
///
/// Used when comparing "now" with an event whose start lives in another zone:
/// the local clock reading is kept and only the zone changes.
pub fn wall_clock_in(now: DateTime<Utc>, local: Tz, target: Tz) -> DateTime<Tz> {
    let wall_clock = now.with_timezone(&local).naive_local();
    resolve_local(&target, &wall_clock)
}

/// Adds the whole days contained in `duration` to `date`.
///
/// Sub-day remainders are dropped. Returns `None` if the result would fall
/// outside the range chrono can represent.
pub fn add_whole_days(date: NaiveDate, duration: Duration) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(duration.num_days())?)
}

/// A time window for querying calendar events.
///
/// Both ends are inclusive, matching CalDAV time-range overlap semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window.
    pub start: DateTime<Utc>,
    /// End of the window.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window from two instants in any zone.
    pub fn new<A: TimeZone, B: TimeZone>(start: DateTime<A>, end: DateTime<B>) -> Self {
        Self {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        }
    }

    /// Creates the window covering one calendar day in `tz`, from midnight
    /// to the last microsecond before the next midnight.
    pub fn for_date(date: NaiveDate, tz: &Tz) -> Self {
        let midnight = date.and_time(NaiveTime::MIN);
        let end_of_day = midnight + Duration::days(1) - Duration::microseconds(1);
        Self::new(resolve_local(tz, &midnight), resolve_local(tz, &end_of_day))
    }
}
