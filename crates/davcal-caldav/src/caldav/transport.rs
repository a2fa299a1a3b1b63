//! [`CalendarTransport`] over HTTP.

use tracing::{debug, info, instrument};
use url::Url;

use davcal_core::TimeWindow;

use crate::config::CalDavConfig;
use crate::error::{CalDavError, CalDavResult};
use crate::transport::{CalendarHandle, CalendarObject, CalendarTransport};

use super::http::{DavHttpClient, PutCondition};
use super::xml;

/// CalDAV transport talking to one server.
pub struct CalDavTransport {
    http: DavHttpClient,
    base: Url,
}

impl CalDavTransport {
    /// Creates a transport for the configured server. No request is sent yet.
    pub fn new(config: &CalDavConfig) -> CalDavResult<Self> {
        Ok(Self {
            http: DavHttpClient::new(config)?,
            base: config.url.clone(),
        })
    }

    /// Follows a single href-valued property, falling back to `from`.
    fn follow_property(&self, from: &str, body: &str, property: &str) -> CalDavResult<String> {
        let response = self.http.propfind(from, body, 0)?;
        match xml::parse_property_href(&response, property)? {
            Some(href) => Ok(resolve_href(&self.base, &href)),
            None => {
                debug!(url = %from, property, "property not reported, staying on current URL");
                Ok(from.to_string())
            }
        }
    }

    fn report(&self, calendar: &CalendarHandle, body: &str) -> CalDavResult<Vec<CalendarObject>> {
        let response = self.http.report(&calendar.url, body)?;
        let items = xml::parse_report_response(&response)?;

        Ok(items
            .into_iter()
            .map(|item| {
                let object = CalendarObject::new(resolve_href(&self.base, &item.href), item.data);
                match item.etag {
                    Some(etag) => object.with_etag(etag),
                    None => object,
                }
            })
            .collect())
    }
}

impl CalendarTransport for CalDavTransport {
    #[instrument(skip(self), fields(url = %self.base))]
    fn discover_calendars(&self) -> CalDavResult<Vec<CalendarHandle>> {
        let principal = self.follow_property(
            self.base.as_str(),
            &xml::propfind_principal_body()?,
            "current-user-principal",
        )?;
        debug!(principal = %principal, "resolved principal");

        let home = self.follow_property(
            &principal,
            &xml::propfind_home_body()?,
            "calendar-home-set",
        )?;
        debug!(home = %home, "resolved calendar home");

        let response = self
            .http
            .propfind(&home, &xml::propfind_calendars_body()?, 1)?;
        let calendars: Vec<CalendarHandle> = xml::parse_propfind_response(&response)?
            .into_iter()
            .map(|collection| {
                let handle = CalendarHandle::new(resolve_href(&self.base, &collection.href));
                match collection.display_name {
                    Some(name) => handle.with_display_name(name),
                    None => handle,
                }
            })
            .collect();

        info!(count = calendars.len(), "discovered calendars");
        Ok(calendars)
    }

    #[instrument(skip(self, window), fields(calendar = %calendar.url))]
    fn query_range(
        &self,
        calendar: &CalendarHandle,
        window: &TimeWindow,
        expand: bool,
    ) -> CalDavResult<Vec<CalendarObject>> {
        debug!(start = %window.start, end = %window.end, expand, "querying time range");
        let body = xml::calendar_query_body(Some(window), expand)?;
        self.report(calendar, &body)
    }

    #[instrument(skip(self), fields(calendar = %calendar.url))]
    fn list_objects(&self, calendar: &CalendarHandle) -> CalDavResult<Vec<CalendarObject>> {
        let body = xml::calendar_query_body(None, false)?;
        self.report(calendar, &body)
    }

    fn fetch_object(&self, url: &str) -> CalDavResult<CalendarObject> {
        debug!(url, "fetching object");
        let fetched = self.http.get(url)?;
        let object = CalendarObject::new(url, fetched.body);
        Ok(match fetched.etag {
            Some(etag) => object.with_etag(etag),
            None => object,
        })
    }

    fn create_object(
        &self,
        calendar: &CalendarHandle,
        uid: &str,
        data: &str,
    ) -> CalDavResult<String> {
        let url = object_url(&calendar.url, uid)?;
        debug!(url = %url, "creating object");
        self.http.put(&url, data, PutCondition::CreateOnly)?;
        Ok(url)
    }

    fn delete_object(&self, url: &str, etag: Option<&str>) -> CalDavResult<()> {
        debug!(url, etag, "deleting object");
        self.http.delete(url, etag)
    }

    fn update_object(&self, url: &str, data: &str, etag: Option<&str>) -> CalDavResult<()> {
        debug!(url, etag, "updating object");
        let condition = match etag {
            Some(etag) => PutCondition::IfMatch(etag),
            None => PutCondition::None,
        };
        self.http.put(url, data, condition)?;
        Ok(())
    }
}

/// Resolves a possibly relative href against the base URL.
fn resolve_href(base: &Url, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        base.join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}

/// URL of the `<uid>.ics` resource inside a collection.
fn object_url(collection: &str, uid: &str) -> CalDavResult<String> {
    let mut base = Url::parse(collection).map_err(|e| {
        CalDavError::configuration(format!("invalid calendar URL {}: {}", collection, e))
            .with_source(e)
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("{}.ics", uid))
        .map(|u| u.to_string())
        .map_err(|e| CalDavError::internal(format!("invalid resource name {}: {}", uid, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use mockito::{Matcher, Server, ServerGuard};

    const DIGEST_CHALLENGE: &str = r#"Digest realm="dav", nonce="n1", qop="auth""#;

    fn transport(server: &ServerGuard) -> CalDavTransport {
        let config = CalDavConfig::new(format!("{}/dav/", server.url()))
            .unwrap()
            .with_credentials("alice", "s3cret");
        CalDavTransport::new(&config).unwrap()
    }

    fn href_response(property: &str, href: &str) -> String {
        format!(
            r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/</d:href>
    <d:propstat>
      <d:prop><{property}><d:href>{href}</d:href></{property}></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#
        )
    }

    fn missing_property_response(property: &str) -> String {
        format!(
            r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/</d:href>
    <d:propstat>
      <d:prop><{property}/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#
        )
    }

    fn collections_response(home: &str) -> String {
        format!(
            r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>{home}</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>{home}work/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Work</d:displayname>
        <d:resourcetype><d:collection/><c:calendar/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#
        )
    }

    #[test]
    fn transport_creation() {
        let config = CalDavConfig::new("https://caldav.example.com/dav/")
            .unwrap()
            .with_credentials("user", "pass");
        assert!(CalDavTransport::new(&config).is_ok());
    }

    // ── HTTP tests (with mockito) ──────────────────────────

    #[test]
    fn discovery_follows_principal_and_home() {
        let mut server = Server::new();
        let principal = server
            .mock("PROPFIND", "/dav/")
            .match_header("depth", "0")
            .match_body(Matcher::Regex("current-user-principal".into()))
            .with_status(207)
            .with_body(href_response("d:current-user-principal", "/dav/principals/alice/"))
            .create();
        let home = server
            .mock("PROPFIND", "/dav/principals/alice/")
            .match_header("depth", "0")
            .match_body(Matcher::Regex("calendar-home-set".into()))
            .with_status(207)
            .with_body(href_response("c:calendar-home-set", "/dav/calendars/alice/"))
            .create();
        let listing = server
            .mock("PROPFIND", "/dav/calendars/alice/")
            .match_header("depth", "1")
            .with_status(207)
            .with_body(collections_response("/dav/calendars/alice/"))
            .create();

        let calendars = transport(&server).discover_calendars().unwrap();

        assert_eq!(calendars.len(), 1);
        assert_eq!(
            calendars[0].url,
            format!("{}/dav/calendars/alice/work/", server.url())
        );
        assert_eq!(calendars[0].display_name.as_deref(), Some("Work"));
        principal.assert();
        home.assert();
        listing.assert();
    }

    #[test]
    fn discovery_stays_on_base_url_without_properties() {
        let mut server = Server::new();
        let principal = server
            .mock("PROPFIND", "/dav/")
            .match_header("depth", "0")
            .match_body(Matcher::Regex("current-user-principal".into()))
            .with_status(207)
            .with_body(missing_property_response("d:current-user-principal"))
            .create();
        let home = server
            .mock("PROPFIND", "/dav/")
            .match_header("depth", "0")
            .match_body(Matcher::Regex("calendar-home-set".into()))
            .with_status(207)
            .with_body(missing_property_response("c:calendar-home-set"))
            .create();
        let listing = server
            .mock("PROPFIND", "/dav/")
            .match_header("depth", "1")
            .with_status(207)
            .with_body(collections_response("/dav/"))
            .create();

        let calendars = transport(&server).discover_calendars().unwrap();

        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].url, format!("{}/dav/work/", server.url()));
        principal.assert();
        home.assert();
        listing.assert();
    }

    #[test]
    fn digest_challenge_is_answered_and_reused() {
        let mut server = Server::new();
        let challenge = server
            .mock("GET", "/dav/a.ics")
            .match_header("authorization", Matcher::Missing)
            .with_status(401)
            .with_header("www-authenticate", DIGEST_CHALLENGE)
            .expect(1)
            .create();
        let authorized = server
            .mock("GET", "/dav/a.ics")
            .match_header(
                "authorization",
                Matcher::Regex(
                    r#"^Digest username="alice", realm="dav", nonce="n1", uri="/dav/a.ics""#
                        .into(),
                ),
            )
            .with_status(200)
            .with_header("etag", "\"v1\"")
            .with_body("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n")
            .expect(2)
            .create();

        let transport = transport(&server);
        let url = format!("{}/dav/a.ics", server.url());
        let first = transport.fetch_object(&url).unwrap();
        let second = transport.fetch_object(&url).unwrap();

        assert_eq!(first.etag.as_deref(), Some("\"v1\""));
        assert!(second.data.starts_with("BEGIN:VCALENDAR"));
        challenge.assert();
        authorized.assert();
    }

    #[test]
    fn basic_challenge_is_answered() {
        let mut server = Server::new();
        let challenge = server
            .mock("GET", "/dav/a.ics")
            .match_header("authorization", Matcher::Missing)
            .with_status(401)
            .with_header("www-authenticate", r#"Basic realm="dav""#)
            .create();
        let authorized = server
            .mock("GET", "/dav/a.ics")
            .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
            .with_status(200)
            .with_body("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n")
            .create();

        let object = transport(&server)
            .fetch_object(&format!("{}/dav/a.ics", server.url()))
            .unwrap();

        assert!(object.etag.is_none());
        challenge.assert();
        authorized.assert();
    }

    #[test]
    fn refused_credentials_are_an_authentication_error() {
        let mut server = Server::new();
        let refused = server
            .mock("GET", "/dav/a.ics")
            .with_status(401)
            .with_header("www-authenticate", r#"Basic realm="dav""#)
            .expect(2)
            .create();

        let err = transport(&server)
            .fetch_object(&format!("{}/dav/a.ics", server.url()))
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::AuthenticationFailed);
        refused.assert();
    }

    #[test]
    fn stale_nonce_is_renegotiated() {
        let mut server = Server::new();
        let challenge = server
            .mock("GET", "/dav/a.ics")
            .match_header("authorization", Matcher::Missing)
            .with_status(401)
            .with_header("www-authenticate", DIGEST_CHALLENGE)
            .create();
        let first = server
            .mock("GET", "/dav/a.ics")
            .match_header("authorization", Matcher::Regex(r#"nonce="n1""#.into()))
            .with_status(200)
            .with_body("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n")
            .create();
        let stale = server
            .mock("GET", "/dav/b.ics")
            .match_header("authorization", Matcher::Regex(r#"nonce="n1""#.into()))
            .with_status(401)
            .with_header(
                "www-authenticate",
                r#"Digest realm="dav", nonce="n2", qop="auth", stale=true"#,
            )
            .create();
        let renewed = server
            .mock("GET", "/dav/b.ics")
            .match_header("authorization", Matcher::Regex(r#"nonce="n2""#.into()))
            .with_status(200)
            .with_body("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n")
            .create();

        let transport = transport(&server);
        transport
            .fetch_object(&format!("{}/dav/a.ics", server.url()))
            .unwrap();
        transport
            .fetch_object(&format!("{}/dav/b.ics", server.url()))
            .unwrap();

        challenge.assert();
        first.assert();
        stale.assert();
        renewed.assert();
    }

    #[test]
    fn create_sends_if_none_match() {
        let mut server = Server::new();
        let put = server
            .mock("PUT", "/dav/work/abc.ics")
            .match_header("if-none-match", "*")
            .match_header("if-match", Matcher::Missing)
            .match_header("content-type", Matcher::Regex("^text/calendar".into()))
            .match_body("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n")
            .with_status(201)
            .create();

        let calendar = CalendarHandle::new(format!("{}/dav/work/", server.url()));
        let url = transport(&server)
            .create_object(&calendar, "abc", "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n")
            .unwrap();

        assert_eq!(url, format!("{}/dav/work/abc.ics", server.url()));
        put.assert();
    }

    #[test]
    fn update_and_delete_send_etag_unchanged() {
        let mut server = Server::new();
        let put = server
            .mock("PUT", "/dav/work/abc.ics")
            .match_header("if-match", "\"v1\"")
            .match_header("if-none-match", Matcher::Missing)
            .with_status(204)
            .create();
        let delete = server
            .mock("DELETE", "/dav/work/abc.ics")
            .match_header("if-match", "W/\"v2\"")
            .with_status(204)
            .create();

        let transport = transport(&server);
        let url = format!("{}/dav/work/abc.ics", server.url());
        transport
            .update_object(&url, "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n", Some("\"v1\""))
            .unwrap();
        transport.delete_object(&url, Some("W/\"v2\"")).unwrap();

        put.assert();
        delete.assert();
    }

    #[test]
    fn unconditional_update_has_no_precondition() {
        let mut server = Server::new();
        let put = server
            .mock("PUT", "/dav/work/abc.ics")
            .match_header("if-match", Matcher::Missing)
            .match_header("if-none-match", Matcher::Missing)
            .with_status(204)
            .create();

        transport(&server)
            .update_object(
                &format!("{}/dav/work/abc.ics", server.url()),
                "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
                None,
            )
            .unwrap();

        put.assert();
    }

    #[test]
    fn changed_etag_is_precondition_failed() {
        let mut server = Server::new();
        let _put = server
            .mock("PUT", "/dav/work/abc.ics")
            .with_status(412)
            .create();

        let err = transport(&server)
            .update_object(
                &format!("{}/dav/work/abc.ics", server.url()),
                "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n",
                Some("\"old\""),
            )
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
    }

    #[test]
    fn missing_object_is_not_found() {
        let mut server = Server::new();
        let _get = server.mock("GET", "/dav/gone.ics").with_status(404).create();

        let err = transport(&server)
            .fetch_object(&format!("{}/dav/gone.ics", server.url()))
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn range_query_reports_objects() {
        let mut server = Server::new();
        let report = server
            .mock("REPORT", "/dav/work/")
            .match_header("depth", "1")
            .match_body(Matcher::Regex("time-range".into()))
            .with_status(207)
            .with_body(
                r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/work/a.ics</d:href>
    <d:propstat><d:prop>
      <d:getetag>"e1"</d:getetag>
      <c:calendar-data>BEGIN:VCALENDAR
END:VCALENDAR</c:calendar-data>
    </d:prop></d:propstat>
  </d:response>
</d:multistatus>"#,
            )
            .create();

        let calendar = CalendarHandle::new(format!("{}/dav/work/", server.url()));
        let window = TimeWindow::for_date(
            chrono::NaiveDate::from_ymd_opt(2025, 2, 5).unwrap(),
            &chrono_tz::Tz::UTC,
        );
        let objects = transport(&server)
            .query_range(&calendar, &window, true)
            .unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].url, format!("{}/dav/work/a.ics", server.url()));
        assert_eq!(objects[0].etag.as_deref(), Some("\"e1\""));
        report.assert();
    }

    #[test]
    fn resolve_relative_href() {
        let base = Url::parse("https://caldav.example.com/calendars/user/").unwrap();

        assert_eq!(
            resolve_href(&base, "work/"),
            "https://caldav.example.com/calendars/user/work/"
        );
        assert_eq!(
            resolve_href(&base, "/remote.php/dav/calendars/user/personal/"),
            "https://caldav.example.com/remote.php/dav/calendars/user/personal/"
        );
        assert_eq!(
            resolve_href(&base, "https://other.example.com/cal/"),
            "https://other.example.com/cal/"
        );
    }

    #[test]
    fn object_url_inside_collection() {
        assert_eq!(
            object_url("https://dav.example.com/cal/work/", "abc").unwrap(),
            "https://dav.example.com/cal/work/abc.ics"
        );
        assert_eq!(
            object_url("https://dav.example.com/cal/work", "abc").unwrap(),
            "https://dav.example.com/cal/work/abc.ics"
        );
    }

    #[test]
    fn object_url_rejects_invalid_collection() {
        let err = object_url("not a url", "abc").unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::ConfigurationError);
    }
}
