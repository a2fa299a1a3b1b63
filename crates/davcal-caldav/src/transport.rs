//! The protocol transport seam.
//!
//! [`CalendarTransport`] is everything the calendar client needs from a
//! CalDAV implementation. The HTTP implementation lives in
//! [`crate::caldav::CalDavTransport`]; tests plug in in-memory fakes.

use davcal_core::TimeWindow;

use crate::error::CalDavResult;

/// A calendar collection on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarHandle {
    /// Absolute URL of the collection.
    pub url: String,
    /// The collection's display name, if the server reported one.
    pub display_name: Option<String>,
}

impl CalendarHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Checks the display name and URL for `hint`, ignoring case.
    pub fn matches_hint(&self, hint: &str) -> bool {
        let hint = hint.to_lowercase();
        self.display_name
            .as_ref()
            .is_some_and(|name| name.to_lowercase().contains(&hint))
            || self.url.to_lowercase().contains(&hint)
    }
}

/// One calendar object resource as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarObject {
    /// Absolute URL of the resource.
    pub url: String,
    /// Entity tag for conditional requests, exactly as the server sent it.
    pub etag: Option<String>,
    /// Raw iCalendar payload.
    pub data: String,
}

impl CalendarObject {
    pub fn new(url: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            etag: None,
            data: data.into(),
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Network operations against a CalDAV server.
///
/// Calls block until the server answers. Implementations do not retry.
pub trait CalendarTransport {
    /// Lists the calendar collections of the authenticated principal.
    fn discover_calendars(&self) -> CalDavResult<Vec<CalendarHandle>>;

    /// Returns the objects holding events that overlap `window`.
    ///
    /// With `expand` set, the server is asked to expand recurring events into
    /// their individual instances inside the window.
    fn query_range(
        &self,
        calendar: &CalendarHandle,
        window: &TimeWindow,
        expand: bool,
    ) -> CalDavResult<Vec<CalendarObject>>;

    /// Returns every event object in the collection.
    fn list_objects(&self, calendar: &CalendarHandle) -> CalDavResult<Vec<CalendarObject>>;

    /// Loads the current state of one object.
    ///
    /// Fails with [`ErrorCode::NotFound`](crate::ErrorCode::NotFound) when
    /// nothing lives at `url`.
    fn fetch_object(&self, url: &str) -> CalDavResult<CalendarObject>;

    /// Stores a new object named after `uid` and returns its URL.
    fn create_object(&self, calendar: &CalendarHandle, uid: &str, data: &str)
    -> CalDavResult<String>;

    /// Deletes an object, only if it still carries `etag` when one is given.
    fn delete_object(&self, url: &str, etag: Option<&str>) -> CalDavResult<()>;

    /// Replaces an object's payload, only if it still carries `etag` when one
    /// is given.
    fn update_object(&self, url: &str, data: &str, etag: Option<&str>) -> CalDavResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_matches_display_name_or_url() {
        let handle = CalendarHandle::new("https://dav.example.com/calendars/alice/work/")
            .with_display_name("Work Calendar");

        assert!(handle.matches_hint("work"));
        assert!(handle.matches_hint("CALENDAR"));
        assert!(handle.matches_hint("alice"));
        assert!(!handle.matches_hint("personal"));
    }

    #[test]
    fn hint_without_display_name() {
        let handle = CalendarHandle::new("https://dav.example.com/calendars/alice/personal/");
        assert!(handle.matches_hint("Personal"));
    }

    #[test]
    fn object_builder() {
        let object = CalendarObject::new("https://dav.example.com/a.ics", "BEGIN:VCALENDAR")
            .with_etag("abc");
        assert_eq!(object.etag.as_deref(), Some("abc"));
    }
}
