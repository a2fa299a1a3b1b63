//! iCalendar codec on top of the `icalendar` crate.

use icalendar::{
    Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event, Property,
    ValueType,
};
use tracing::{debug, trace};

use davcal_core::CalendarTime;

use crate::codec::{CalendarCodec, EventComponent};
use crate::error::{CalDavError, CalDavResult};

/// [`CalendarCodec`] backed by the `icalendar` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcsCodec;

impl IcsCodec {
    pub fn new() -> Self {
        Self
    }
}

impl CalendarCodec for IcsCodec {
    fn decode(&self, raw: &str) -> CalDavResult<Vec<EventComponent>> {
        let calendar = parse_calendar(raw)?;

        let events: Vec<_> = calendar
            .components
            .iter()
            .filter_map(|component| match component {
                CalendarComponent::Event(event) => Some(read_event(event)),
                _ => None,
            })
            .collect();

        trace!(count = events.len(), "Decoded VEVENT components");
        Ok(events)
    }

    fn encode(&self, component: &EventComponent) -> CalDavResult<String> {
        let mut event = Event::new();

        if let Some(ref uid) = component.uid {
            event.uid(uid);
        }
        if let Some(ref summary) = component.summary {
            event.summary(summary);
        }
        if let Some(ref start) = component.start {
            write_time(&mut event, "DTSTART", start);
        }
        if let Some(ref end) = component.end {
            write_time(&mut event, "DTEND", end);
        }

        let event = event.done();
        let mut calendar = Calendar::new();
        calendar.push(event);
        let calendar = calendar.done();

        Ok(calendar.to_string())
    }

    /// Rewrites the SUMMARY line of every VEVENT in place.
    ///
    /// The payload is edited as text: every other content line, including
    /// nested components such as VALARM and VTIMEZONE, is written back
    /// exactly as received. Events without a SUMMARY get one appended.
    fn set_summary(&self, raw: &str, summary: &str) -> CalDavResult<String> {
        parse_calendar(raw)?;

        let newline = if raw.contains("\r\n") { "\r\n" } else { "\n" };
        let replacement = fold_line(&format!("SUMMARY:{}", escape_text(summary)), newline);

        let mut out = String::with_capacity(raw.len() + replacement.len());
        let mut components: Vec<String> = Vec::new();
        let mut has_summary = false;
        let mut renamed = 0usize;

        for line in content_lines(raw) {
            let unfolded = unfold(line);
            let (name, value) = split_content_line(&unfolded);
            let in_event = components.last().is_some_and(|c| c == "VEVENT");

            if name.eq_ignore_ascii_case("BEGIN") {
                components.push(value.trim().to_ascii_uppercase());
                if value.trim().eq_ignore_ascii_case("VEVENT") {
                    has_summary = false;
                }
            } else if name.eq_ignore_ascii_case("END") {
                if in_event && value.trim().eq_ignore_ascii_case("VEVENT") {
                    if !has_summary {
                        out.push_str(&replacement);
                    }
                    renamed += 1;
                }
                components.pop();
            } else if in_event && name.eq_ignore_ascii_case("SUMMARY") {
                // Duplicate SUMMARY lines collapse into the new one.
                if !has_summary {
                    out.push_str(&replacement);
                    has_summary = true;
                }
                continue;
            }

            out.push_str(line);
        }

        if renamed == 0 {
            return Err(CalDavError::decode("payload contains no VEVENT to rename"));
        }

        debug!(events = renamed, "Replaced SUMMARY");
        Ok(out)
    }
}

fn parse_calendar(raw: &str) -> CalDavResult<Calendar> {
    let trimmed = raw.trim_start();
    let looks_like_ics = trimmed
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !looks_like_ics {
        return Err(CalDavError::decode(
            "payload does not start with BEGIN:VCALENDAR",
        ));
    }

    trimmed
        .parse::<Calendar>()
        .map_err(|e| CalDavError::decode(format!("failed to parse iCalendar payload: {}", e)))
}

/// Splits a payload into content lines. Each slice carries its folded
/// continuation lines and its trailing line break.
fn content_lines(raw: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for physical in raw.split_inclusive('\n') {
        let continues = physical.starts_with([' ', '\t']);
        if !continues && offset > start {
            lines.push(&raw[start..offset]);
            start = offset;
        }
        offset += physical.len();
    }
    if offset > start {
        lines.push(&raw[start..offset]);
    }
    lines
}

fn unfold(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for (i, physical) in line.split_inclusive('\n').enumerate() {
        let physical = physical.trim_end_matches(['\r', '\n']);
        if i == 0 {
            out.push_str(physical);
        } else {
            out.push_str(physical.get(1..).unwrap_or_default());
        }
    }
    out
}

/// Returns the property name and the value of an unfolded content line.
fn split_content_line(line: &str) -> (&str, &str) {
    let name_end = line.find([':', ';']).unwrap_or(line.len());
    let value = line.find(':').map_or("", |idx| &line[idx + 1..]);
    (&line[..name_end], value)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Folds a content line at 75 octets, never splitting a UTF-8 sequence.
fn fold_line(content: &str, newline: &str) -> String {
    const MAX_OCTETS: usize = 75;

    let mut out = String::with_capacity(content.len() + newline.len());
    let mut width = 0;
    for ch in content.chars() {
        if width + ch.len_utf8() > MAX_OCTETS {
            out.push_str(newline);
            out.push(' ');
            width = 1;
        }
        out.push(ch);
        width += ch.len_utf8();
    }
    out.push_str(newline);
    out
}

fn read_event(event: &Event) -> EventComponent {
    EventComponent {
        uid: event.get_uid().map(str::to_string),
        summary: event.get_summary().map(str::to_string),
        start: event.get_start().map(to_calendar_time),
        end: event.get_end().map(to_calendar_time),
    }
}

fn to_calendar_time(value: DatePerhapsTime) -> CalendarTime {
    match value {
        DatePerhapsTime::Date(date) => CalendarTime::Date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => CalendarTime::Utc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            CalendarTime::Floating(naive)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            CalendarTime::Zoned { date_time, tzid }
        }
    }
}

/// Writes a date or date-time property in the form RFC 5545 expects for it.
fn write_time(event: &mut Event, name: &str, time: &CalendarTime) {
    match time {
        CalendarTime::Date(date) => {
            let mut prop = Property::new(name, date.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            event.append_property(prop);
        }
        CalendarTime::Utc(dt) => {
            event.add_property(name, dt.format("%Y%m%dT%H%M%SZ").to_string());
        }
        CalendarTime::Floating(naive) => {
            event.add_property(name, naive.format("%Y%m%dT%H%M%S").to_string());
        }
        CalendarTime::Zoned { date_time, tzid } => {
            let mut prop = Property::new(name, date_time.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            event.append_property(prop);
        }
    }
}
