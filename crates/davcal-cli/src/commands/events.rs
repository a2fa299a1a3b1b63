//! Read-only event commands.

use chrono::{NaiveDate, Utc};

use davcal_caldav::{CalendarClient, CalendarCodec, CalendarTransport};
use davcal_core::Event;

use crate::cli::TimeArg;
use crate::error::{ClientError, ClientResult};

/// Shows today's events in the configured zone.
pub fn today<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    json: bool,
) -> ClientResult<()> {
    let today = Utc::now()
        .with_timezone(&client.local_timezone())
        .date_naive();
    day(client, today, json)
}

/// Shows the events of one day.
pub fn day<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    date: NaiveDate,
    json: bool,
) -> ClientResult<()> {
    let events = client.get_events_for_date(date)?;
    println!("{}", render_events(&events, json)?);
    Ok(())
}

/// Shows the events between two points in time.
pub fn range<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    start: TimeArg,
    end: TimeArg,
    json: bool,
) -> ClientResult<()> {
    let tz = client.local_timezone();
    let (start, end) = (start.in_zone(tz), end.in_zone(tz));
    if end < start {
        return Err(ClientError::Usage(format!(
            "range end {} is before start {}",
            end, start
        )));
    }
    let events = client.get_events_for_timeperiod(start, end)?;
    println!("{}", render_events(&events, json)?);
    Ok(())
}

/// Shows the next upcoming event.
pub fn next<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    json: bool,
) -> ClientResult<()> {
    let event = client.get_next_event()?;
    if json {
        println!("{}", to_json(&event)?);
    } else {
        match event {
            Some(event) => println!("{}", format_event(&event)),
            None => println!("No upcoming event"),
        }
    }
    Ok(())
}

/// Shows the events whose title contains `title`.
pub fn search<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    title: &str,
    json: bool,
) -> ClientResult<()> {
    let events = client.get_events_with_title(title)?;
    println!("{}", render_events(&events, json)?);
    Ok(())
}

/// Lists the account's calendars, marking the one in use.
pub fn calendars<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    json: bool,
) -> ClientResult<()> {
    let calendars = client.transport().discover_calendars()?;
    let active = &client.calendar().url;

    if json {
        let listing: Vec<_> = calendars
            .iter()
            .map(|c| {
                serde_json::json!({
                    "url": c.url,
                    "display_name": c.display_name,
                    "active": &c.url == active,
                })
            })
            .collect();
        println!("{}", to_json(&listing)?);
        return Ok(());
    }

    for calendar in &calendars {
        let marker = if &calendar.url == active { "*" } else { " " };
        println!(
            "{} {}  {}",
            marker,
            calendar.display_name.as_deref().unwrap_or("(unnamed)"),
            calendar.url
        );
    }
    Ok(())
}

/// Renders a list of events as text lines or a JSON array.
pub fn render_events(events: &[Event], json: bool) -> ClientResult<String> {
    if json {
        return to_json(&events);
    }
    if events.is_empty() {
        return Ok("No events".to_string());
    }
    Ok(events
        .iter()
        .map(format_event)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// One line per event: when, title, then the URL used by delete and rename.
pub fn format_event(event: &Event) -> String {
    let when = match (event.starttime, event.endtime) {
        (Some(start), Some(end)) if start.date_naive() == end.date_naive() => format!(
            "{} - {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%H:%M")
        ),
        (Some(start), Some(end)) => format!(
            "{} - {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        ),
        (Some(start), None) => start.format("%Y-%m-%d %H:%M").to_string(),
        (None, _) => "(no start)".to_string(),
    };
    format!("{}  {}  <{}>", when, event.title, event.event_url)
}

fn to_json<S: serde::Serialize>(value: &S) -> ClientResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ClientError::Usage(format!("failed to serialize output: {}", e)))
}
