//! Simplified event records.
//!
//! - [`EventDetails`]: title and times decoded from one VEVENT
//! - [`Event`]: the same plus the URL that locates the event on the server

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// Title used for events that carry no SUMMARY.
pub const UNTITLED_EVENT: &str = "untitled event";

/// Title and times of a decoded event, before its identifier is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetails {
    /// Event summary, or [`UNTITLED_EVENT`].
    pub title: String,
    /// Start instant, if the event has one.
    pub starttime: Option<DateTime<Tz>>,
    /// End instant, if the event has one.
    pub endtime: Option<DateTime<Tz>>,
}

impl EventDetails {
    /// Attaches the server-side identifier, producing an [`Event`].
    pub fn with_url(self, event_url: impl Into<String>) -> Event {
        Event {
            title: self.title,
            starttime: self.starttime,
            endtime: self.endtime,
            event_url: event_url.into(),
        }
    }
}

/// A calendar event as returned by every query.
///
/// Built fresh on each call; nothing is cached. `event_url` is the handle
/// used to find the event again for renaming or deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub title: String,
    pub starttime: Option<DateTime<Tz>>,
    pub endtime: Option<DateTime<Tz>>,
    pub event_url: String,
}

impl Event {
    /// Creates an event that only knows its location on the server.
    ///
    /// Enough for delete and rename calls, which resolve everything else
    /// remotely.
    pub fn from_url(event_url: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            starttime: None,
            endtime: None,
            event_url: event_url.into(),
        }
    }

    /// Case-insensitive substring match on the title.
    pub fn title_contains(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(&query.to_lowercase())
    }
}
