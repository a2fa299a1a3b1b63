//! The format codec seam.
//!
//! [`CalendarCodec`] turns raw iCalendar payloads into [`EventComponent`]s
//! and back. [`crate::ics::IcsCodec`] is the implementation on top of the
//! `icalendar` crate.

use davcal_core::CalendarTime;

use crate::error::CalDavResult;

/// The fields of one VEVENT that the client reads or writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventComponent {
    /// UID property.
    pub uid: Option<String>,
    /// SUMMARY property.
    pub summary: Option<String>,
    /// DTSTART property.
    pub start: Option<CalendarTime>,
    /// DTEND property.
    pub end: Option<CalendarTime>,
}

impl EventComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_start(mut self, start: CalendarTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: CalendarTime) -> Self {
        self.end = Some(end);
        self
    }
}

/// iCalendar parsing and serialization.
pub trait CalendarCodec {
    /// Parses a payload and returns its VEVENT components in document order.
    ///
    /// A payload without events yields an empty list; a payload that is not
    /// iCalendar at all is a [`DecodeError`](crate::ErrorCode::DecodeError).
    fn decode(&self, raw: &str) -> CalDavResult<Vec<EventComponent>>;

    /// Builds a VCALENDAR payload holding `component` as its only event.
    fn encode(&self, component: &EventComponent) -> CalDavResult<String>;

    /// Returns `raw` with the SUMMARY of every VEVENT replaced by `summary`.
    ///
    /// Everything else in the payload is carried over.
    fn set_summary(&self, raw: &str, summary: &str) -> CalDavResult<String>;
}
