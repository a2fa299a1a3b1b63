//! XML bodies and multistatus parsing for WebDAV/CalDAV requests.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use davcal_core::TimeWindow;

use crate::error::{CalDavError, CalDavResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

/// A collection listed by a Depth 1 PROPFIND on the calendar home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCollection {
    pub href: String,
    pub display_name: Option<String>,
}

/// One `<response>` of a calendar REPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub href: String,
    /// ETag as listed by the server, quotes included.
    pub etag: Option<String>,
    /// Raw `calendar-data` content.
    pub data: String,
}

/// Small wrapper over the quick-xml writer for request bodies.
struct XmlBody {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlBody {
    fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    fn element(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
        let mut element = BytesStart::new(name.to_string());
        for attr in attrs {
            element.push_attribute(*attr);
        }
        element
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> CalDavResult<()> {
        self.writer
            .write_event(Event::Start(Self::element(name, attrs)))
            .map_err(xml_write_error)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> CalDavResult<()> {
        self.writer
            .write_event(Event::Empty(Self::element(name, attrs)))
            .map_err(xml_write_error)
    }

    fn close(&mut self, name: &str) -> CalDavResult<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_write_error)
    }

    fn finish(self) -> CalDavResult<String> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| CalDavError::internal("request body is not UTF-8").with_source(e))
    }
}

fn xml_write_error(e: impl std::fmt::Display) -> CalDavError {
    CalDavError::internal(format!("failed to write XML body: {}", e))
}

/// PROPFIND body asking for a single property in the DAV or CalDAV namespace.
fn propfind_single(property: &str) -> CalDavResult<String> {
    let mut body = XmlBody::new();
    body.open("d:propfind", &[("xmlns:d", DAV_NS), ("xmlns:c", CALDAV_NS)])?;
    body.open("d:prop", &[])?;
    body.empty(property, &[])?;
    body.close("d:prop")?;
    body.close("d:propfind")?;
    body.finish()
}

/// PROPFIND body for `current-user-principal`.
pub fn propfind_principal_body() -> CalDavResult<String> {
    propfind_single("d:current-user-principal")
}

/// PROPFIND body for `calendar-home-set`.
pub fn propfind_home_body() -> CalDavResult<String> {
    propfind_single("c:calendar-home-set")
}

/// PROPFIND body listing collections with their names and resource types.
pub fn propfind_calendars_body() -> CalDavResult<String> {
    let mut body = XmlBody::new();
    body.open("d:propfind", &[("xmlns:d", DAV_NS), ("xmlns:c", CALDAV_NS)])?;
    body.open("d:prop", &[])?;
    body.empty("d:displayname", &[])?;
    body.empty("d:resourcetype", &[])?;
    body.close("d:prop")?;
    body.close("d:propfind")?;
    body.finish()
}

/// REPORT `calendar-query` body selecting VEVENT objects.
///
/// With a window, only events overlapping it match; with `expand` as well,
/// recurring events come back as individual instances inside the window.
/// Without a window every event object in the collection matches.
pub fn calendar_query_body(window: Option<&TimeWindow>, expand: bool) -> CalDavResult<String> {
    let range = window.map(|w| {
        (
            format_icalendar_datetime(w.start),
            format_icalendar_datetime(w.end),
        )
    });

    let mut body = XmlBody::new();
    body.open(
        "c:calendar-query",
        &[("xmlns:d", DAV_NS), ("xmlns:c", CALDAV_NS)],
    )?;

    body.open("d:prop", &[])?;
    body.empty("d:getetag", &[])?;
    match (&range, expand) {
        (Some((start, end)), true) => {
            body.open("c:calendar-data", &[])?;
            body.empty("c:expand", &[("start", start.as_str()), ("end", end.as_str())])?;
            body.close("c:calendar-data")?;
        }
        _ => body.empty("c:calendar-data", &[])?,
    }
    body.close("d:prop")?;

    body.open("c:filter", &[])?;
    body.open("c:comp-filter", &[("name", "VCALENDAR")])?;
    match &range {
        Some((start, end)) => {
            body.open("c:comp-filter", &[("name", "VEVENT")])?;
            body.empty("c:time-range", &[("start", start.as_str()), ("end", end.as_str())])?;
            body.close("c:comp-filter")?;
        }
        None => body.empty("c:comp-filter", &[("name", "VEVENT")])?,
    }
    body.close("c:comp-filter")?;
    body.close("c:filter")?;

    body.close("c:calendar-query")?;
    body.finish()
}

fn reader(xml: &str) -> quick_xml::Reader<&[u8]> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader
}

fn parse_error(e: impl std::fmt::Display) -> CalDavError {
    CalDavError::invalid_response(format!("malformed multistatus body: {}", e))
}

/// Finds the first `<href>` nested inside `property` (matched by local name).
///
/// Used for `current-user-principal` and `calendar-home-set`, whose values are
/// hrefs wrapped in the property element.
pub fn parse_property_href(xml: &str, property: &str) -> CalDavResult<Option<String>> {
    let mut reader = reader(xml);
    let mut inside_property = false;
    let mut in_href = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(parse_error)? {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == property.as_bytes() {
                    inside_property = true;
                } else if inside_property && local == b"href" {
                    in_href = true;
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == property.as_bytes() {
                    inside_property = false;
                }
                in_href = false;
            }
            Event::Text(e) if in_href => {
                let text = e.unescape().map_err(parse_error)?;
                return Ok(Some(text.trim().to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

/// Parses a Depth 1 PROPFIND response, keeping only calendar collections.
pub fn parse_propfind_response(xml: &str) -> CalDavResult<Vec<DiscoveredCollection>> {
    let mut collections = Vec::new();
    let mut reader = reader(xml);

    let mut href: Option<String> = None;
    let mut display_name: Option<String> = None;
    let mut is_calendar = false;
    let mut current: Option<&'static str> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(parse_error)? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"response" => {
                    href = None;
                    display_name = None;
                    is_calendar = false;
                }
                b"href" => current = Some("href"),
                b"displayname" => current = Some("displayname"),
                b"calendar" => is_calendar = true,
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"calendar" {
                    is_calendar = true;
                }
            }
            Event::End(e) => {
                if local_name(e.name().as_ref()) == b"response" && is_calendar {
                    if let Some(href) = href.take() {
                        collections.push(DiscoveredCollection {
                            href,
                            display_name: display_name.take(),
                        });
                    }
                }
                current = None;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(parse_error)?.trim().to_string();
                match current {
                    // The first href of a response names the resource itself.
                    Some("href") if href.is_none() => href = Some(text),
                    Some("displayname") => display_name = Some(text),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(collections)
}

/// Parses a calendar REPORT response into its objects.
///
/// Responses without `calendar-data` (e.g. 404 propstats) are skipped.
pub fn parse_report_response(xml: &str) -> CalDavResult<Vec<ReportItem>> {
    let mut items = Vec::new();
    let mut reader = reader(xml);

    let mut href: Option<String> = None;
    let mut etag: Option<String> = None;
    let mut data: Option<String> = None;
    let mut current: Option<&'static str> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(parse_error)? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"response" => {
                    href = None;
                    etag = None;
                    data = None;
                }
                b"href" => current = Some("href"),
                b"getetag" => current = Some("getetag"),
                b"calendar-data" => current = Some("calendar-data"),
                _ => {}
            },
            Event::End(e) => {
                if local_name(e.name().as_ref()) == b"response" {
                    if let (Some(href), Some(data)) = (href.take(), data.take()) {
                        items.push(ReportItem {
                            href,
                            etag: etag.take(),
                            data,
                        });
                    }
                }
                current = None;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(parse_error)?;
                collect_report_text(current, &text, &mut href, &mut etag, &mut data);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).to_string();
                collect_report_text(current, &text, &mut href, &mut etag, &mut data);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn collect_report_text(
    current: Option<&str>,
    text: &str,
    href: &mut Option<String>,
    etag: &mut Option<String>,
    data: &mut Option<String>,
) {
    match current {
        Some("href") => *href = Some(text.trim().to_string()),
        Some("getetag") => *etag = Some(opaque_etag(text)),
        // calendar-data may arrive in several chunks.
        Some("calendar-data") => data.get_or_insert_with(String::new).push_str(text),
        _ => {}
    }
}

/// Keeps an entity tag opaque: quotes and any `W/` prefix stay, so the value
/// can be sent back in `If-Match` unchanged.
pub fn opaque_etag(raw: &str) -> String {
    raw.trim().to_string()
}

/// Extracts the local name from a potentially namespaced element name.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Formats a datetime for CalDAV time-range filters (UTC format).
fn format_icalendar_datetime(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
