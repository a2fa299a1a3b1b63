//! The calendar client.
//!
//! [`CalendarClient`] binds one calendar collection at construction and turns
//! transport results into [`Event`]s. Every query goes to the server; nothing
//! is cached between calls.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use davcal_core::{
    CalendarTime, Event, EventDetails, TimeWindow, UNTITLED_EVENT, add_whole_days, wall_clock_in,
};

use crate::codec::{CalendarCodec, EventComponent};
use crate::error::{CalDavError, CalDavResult};
use crate::transport::{CalendarHandle, CalendarObject, CalendarTransport};

#[cfg(feature = "caldav")]
use crate::{caldav::CalDavTransport, config::CalDavConfig, ics::IcsCodec};

/// Client over the HTTP transport and the `icalendar` codec.
#[cfg(feature = "caldav")]
pub type CalDavClient = CalendarClient<CalDavTransport, IcsCodec>;

/// A calendar client bound to one collection.
pub struct CalendarClient<T, C> {
    transport: T,
    codec: C,
    calendar: CalendarHandle,
    local_tz: Tz,
}

#[cfg(feature = "caldav")]
impl CalendarClient<CalDavTransport, IcsCodec> {
    /// Connects to the configured server and binds a calendar collection.
    ///
    /// # Errors
    ///
    /// Fails when the server rejects the credentials, when discovery fails,
    /// or with [`CalendarError`](crate::ErrorCode::CalendarError) when the
    /// principal owns no calendar collection.
    pub fn connect(config: CalDavConfig) -> CalDavResult<Self> {
        info!(url = %config.url_str(), "connecting to CalDAV server");
        let transport = CalDavTransport::new(&config)?;
        Self::with_parts_and_hint(
            transport,
            IcsCodec::new(),
            config.local_timezone,
            config.calendar_hint.as_deref(),
        )
    }
}

impl<T: CalendarTransport, C: CalendarCodec> CalendarClient<T, C> {
    /// Builds a client from any transport and codec, binding the first
    /// calendar the transport discovers.
    pub fn with_parts(transport: T, codec: C, local_tz: Tz) -> CalDavResult<Self> {
        Self::with_parts_and_hint(transport, codec, local_tz, None)
    }

    /// Like [`with_parts`](Self::with_parts), preferring the calendar that
    /// matches `hint`.
    pub fn with_parts_and_hint(
        transport: T,
        codec: C,
        local_tz: Tz,
        hint: Option<&str>,
    ) -> CalDavResult<Self> {
        let calendars = transport.discover_calendars()?;
        let calendar = select_calendar(calendars, hint)?;
        info!(
            calendar = %calendar.url,
            name = calendar.display_name.as_deref().unwrap_or(""),
            "using calendar"
        );

        Ok(Self {
            transport,
            codec,
            calendar,
            local_tz,
        })
    }

    /// Returns the bound calendar collection.
    pub fn calendar(&self) -> &CalendarHandle {
        &self.calendar
    }

    /// Returns the zone timestamps are expressed in.
    pub fn local_timezone(&self) -> Tz {
        self.local_tz
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Extracts title and times from one decoded VEVENT.
    ///
    /// Dates become midnight UTC, timestamps become instants in the local
    /// zone. A missing SUMMARY yields [`UNTITLED_EVENT`].
    pub fn get_event_details(&self, component: &EventComponent) -> EventDetails {
        EventDetails {
            title: component
                .summary
                .clone()
                .unwrap_or_else(|| UNTITLED_EVENT.to_string()),
            starttime: component.start.as_ref().map(|t| t.to_instant(self.local_tz)),
            endtime: component.end.as_ref().map(|t| t.to_instant(self.local_tz)),
        }
    }

    /// Decodes transport results into events.
    ///
    /// Each VEVENT of an object becomes one event carrying the object's URL.
    /// A payload that fails to decode aborts the whole batch.
    pub fn parse_ics_events(&self, objects: &[CalendarObject]) -> CalDavResult<Vec<Event>> {
        let mut events = Vec::new();
        for object in objects {
            let components = self.codec.decode(&object.data).inspect_err(|e| {
                warn!(url = %object.url, error = %e, "failed to decode calendar object");
            })?;
            events.extend(
                components
                    .iter()
                    .map(|component| self.get_event_details(component).with_url(&object.url)),
            );
        }
        Ok(events)
    }

    /// Returns the events overlapping `[start, end]`, recurrences expanded,
    /// in the order the server listed them.
    pub fn get_events_for_timeperiod<A: TimeZone, B: TimeZone>(
        &self,
        start: DateTime<A>,
        end: DateTime<B>,
    ) -> CalDavResult<Vec<Event>> {
        self.query_window(&TimeWindow::new(start, end))
    }

    /// Returns the events of one day, midnight to end of day in the local zone.
    pub fn get_events_for_date(&self, date: NaiveDate) -> CalDavResult<Vec<Event>> {
        self.query_window(&TimeWindow::for_date(date, &self.local_tz))
    }

    #[instrument(skip(self), fields(start = %window.start, end = %window.end))]
    fn query_window(&self, window: &TimeWindow) -> CalDavResult<Vec<Event>> {
        let objects = self.transport.query_range(&self.calendar, window, true)?;
        let events = self.parse_ics_events(&objects)?;
        debug!(count = events.len(), "fetched events in range");
        Ok(events)
    }

    fn all_events(&self) -> CalDavResult<Vec<Event>> {
        let objects = self.transport.list_objects(&self.calendar)?;
        let events = self.parse_ics_events(&objects)?;
        debug!(count = events.len(), "fetched all events");
        Ok(events)
    }

    /// Returns the next event starting after the current time.
    pub fn get_next_event(&self) -> CalDavResult<Option<Event>> {
        self.get_next_event_at(Utc::now())
    }

    /// Returns the earliest event starting strictly after `now`.
    ///
    /// `now` is read on the local wall clock and compared in each event's
    /// own zone, so all-day events (midnight UTC) are compared against the
    /// local date and time. Events without a start are never candidates.
    pub fn get_next_event_at(&self, now: DateTime<Utc>) -> CalDavResult<Option<Event>> {
        let mut candidates: Vec<(DateTime<Tz>, Event)> = self
            .all_events()?
            .into_iter()
            .filter_map(|event| match event.starttime {
                Some(start) => Some((start, event)),
                None => {
                    debug!(url = %event.event_url, title = %event.title, "skipping event without start");
                    None
                }
            })
            .collect();
        candidates.sort_by_key(|(start, _)| *start);

        Ok(candidates
            .into_iter()
            .find(|(start, _)| *start > wall_clock_in(now, self.local_tz, start.timezone()))
            .map(|(_, event)| event))
    }

    /// Returns every event whose title contains `title`, ignoring case.
    pub fn get_events_with_title(&self, title: &str) -> CalDavResult<Vec<Event>> {
        Ok(self
            .all_events()?
            .into_iter()
            .filter(|event| event.title_contains(title))
            .collect())
    }

    /// Stores a new event in the bound calendar.
    ///
    /// Full-day events span the whole days of `duration` from the date of
    /// `start` and are written as dates. Timed events run from `start` to
    /// `start + duration` and are written as UTC timestamps.
    #[instrument(skip(self, start))]
    pub fn create_new_event<Z: TimeZone>(
        &self,
        title: &str,
        start: DateTime<Z>,
        duration: Duration,
        full_day: bool,
    ) -> CalDavResult<()> {
        let uid = Uuid::new_v4().to_string();
        let (dtstart, dtend) = if full_day {
            let date = start.date_naive();
            let end = add_whole_days(date, duration)
                .ok_or_else(|| CalDavError::encode("event end is out of range"))?;
            (CalendarTime::Date(date), CalendarTime::Date(end))
        } else {
            let start = start.with_timezone(&Utc);
            let end = start
                .checked_add_signed(duration)
                .ok_or_else(|| CalDavError::encode("event end is out of range"))?;
            (CalendarTime::Utc(start), CalendarTime::Utc(end))
        };

        let component = EventComponent::new()
            .with_uid(&uid)
            .with_summary(title)
            .with_start(dtstart)
            .with_end(dtend);
        let data = self.codec.encode(&component)?;

        let url = self.transport.create_object(&self.calendar, &uid, &data)?;
        info!(url = %url, "created event");
        Ok(())
    }

    /// Deletes the event stored at `event.event_url`.
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::ErrorCode::NotFound) when the URL no longer
    /// resolves.
    #[instrument(skip(self, event), fields(url = %event.event_url))]
    pub fn delete_event(&self, event: &Event) -> CalDavResult<()> {
        let object = self.transport.fetch_object(&event.event_url)?;
        self.transport
            .delete_object(&object.url, object.etag.as_deref())?;
        info!("deleted event");
        Ok(())
    }

    /// Renames the event stored at `event.event_url`.
    ///
    /// The stored object is fetched, its SUMMARY replaced and written back
    /// only if it was not modified in between. `event` itself is untouched.
    ///
    /// # Errors
    ///
    /// [`NotFound`](crate::ErrorCode::NotFound) when the URL no longer
    /// resolves, [`PreconditionFailed`](crate::ErrorCode::PreconditionFailed)
    /// when the object changed on the server.
    #[instrument(skip(self, event), fields(url = %event.event_url))]
    pub fn rename_event(&self, event: &Event, new_title: &str) -> CalDavResult<()> {
        let object = self.transport.fetch_object(&event.event_url)?;
        let data = self.codec.set_summary(&object.data, new_title)?;
        self.transport
            .update_object(&object.url, &data, object.etag.as_deref())?;
        info!(title = %new_title, "renamed event");
        Ok(())
    }
}

/// Picks the collection to bind: the first match for `hint`, otherwise the
/// first one listed.
fn select_calendar(
    calendars: Vec<CalendarHandle>,
    hint: Option<&str>,
) -> CalDavResult<CalendarHandle> {
    if let Some(found) = hint.and_then(|hint| calendars.iter().find(|c| c.matches_hint(hint))) {
        return Ok(found.clone());
    }

    let mut calendars = calendars.into_iter();
    let first = calendars
        .next()
        .ok_or_else(|| CalDavError::calendar("no calendar collection found for this account"))?;

    if let Some(hint) = hint {
        warn!(hint, fallback = %first.url, "no calendar matches hint, using the first one");
    }
    Ok(first)
}
