//! Commands that change the calendar.

use chrono::Duration;

use davcal_caldav::{CalendarClient, CalendarCodec, CalendarTransport};
use davcal_core::Event;

use crate::cli::TimeArg;
use crate::error::{ClientError, ClientResult};

/// Creates an event.
pub fn create<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    title: &str,
    start: TimeArg,
    minutes: Option<i64>,
    days: Option<i64>,
    all_day: bool,
) -> ClientResult<()> {
    let duration = event_length(minutes, days, all_day)?;
    let start = start.in_zone(client.local_timezone());

    client.create_new_event(title, start, duration, all_day)?;
    println!("Created \"{}\"", title);
    Ok(())
}

/// Deletes the event at `url`.
pub fn delete<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    url: &str,
) -> ClientResult<()> {
    client.delete_event(&Event::from_url(url))?;
    println!("Deleted {}", url);
    Ok(())
}

/// Renames the event at `url`.
pub fn rename<T: CalendarTransport, C: CalendarCodec>(
    client: &CalendarClient<T, C>,
    url: &str,
    title: &str,
) -> ClientResult<()> {
    client.rename_event(&Event::from_url(url), title)?;
    println!("Renamed {} to \"{}\"", url, title);
    Ok(())
}

/// Picks the event length from the flags: one day for all-day events and an
/// hour for timed ones unless told otherwise.
pub fn event_length(
    minutes: Option<i64>,
    days: Option<i64>,
    all_day: bool,
) -> ClientResult<Duration> {
    let duration = match (minutes, days) {
        (Some(minutes), _) => Duration::minutes(minutes),
        (None, Some(days)) => Duration::days(days),
        (None, None) if all_day => Duration::days(1),
        (None, None) => Duration::hours(1),
    };

    if duration <= Duration::zero() {
        return Err(ClientError::Usage("event length must be positive".to_string()));
    }
    if all_day && duration.num_days() < 1 {
        return Err(ClientError::Usage(
            "all-day events last at least one day".to_string(),
        ));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lengths() {
        assert_eq!(event_length(None, None, false).unwrap(), Duration::hours(1));
        assert_eq!(event_length(None, None, true).unwrap(), Duration::days(1));
    }

    #[test]
    fn explicit_lengths() {
        assert_eq!(
            event_length(Some(30), None, false).unwrap(),
            Duration::minutes(30)
        );
        assert_eq!(event_length(None, Some(3), true).unwrap(), Duration::days(3));
        assert_eq!(event_length(None, Some(2), false).unwrap(), Duration::days(2));
    }

    #[test]
    fn rejects_non_positive_length() {
        assert!(event_length(Some(0), None, false).is_err());
        assert!(event_length(None, Some(-1), true).is_err());
    }

    #[test]
    fn all_day_needs_whole_day() {
        let err = event_length(Some(90), None, true).unwrap_err();
        assert!(err.to_string().contains("at least one day"));
    }
}
