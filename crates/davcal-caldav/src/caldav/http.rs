//! Blocking HTTP client for CalDAV operations.
//!
//! Handles:
//! - Basic and Digest authentication, negotiated from the 401 challenge
//! - PROPFIND, REPORT, GET, PUT and DELETE
//! - mapping HTTP status codes onto [`CalDavError`]s

use std::sync::Mutex;

use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode};
use tracing::{debug, trace, warn};

use crate::config::CalDavConfig;
use crate::error::{CalDavError, CalDavResult};

use super::auth::{Challenge, Credentials};
use super::xml::opaque_etag;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Precondition attached to a PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition<'a> {
    /// Overwrite unconditionally.
    None,
    /// Only create; fail if something already lives at the URL.
    CreateOnly,
    /// Only replace the representation carrying this ETag.
    IfMatch(&'a str),
}

/// Body and ETag of a successful GET.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    pub etag: Option<String>,
}

struct DavRequest<'a> {
    method: Method,
    url: &'a str,
    body: Option<(&'a str, &'static str)>,
    headers: Vec<(&'static str, String)>,
}

impl<'a> DavRequest<'a> {
    fn new(method: Method, url: &'a str) -> Self {
        Self {
            method,
            url,
            body: None,
            headers: Vec::new(),
        }
    }

    fn body(mut self, body: &'a str, content_type: &'static str) -> Self {
        self.body = Some((body, content_type));
        self
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// HTTP client for CalDAV operations.
///
/// The negotiated challenge is remembered so later requests authenticate up
/// front instead of taking a 401 round-trip each time.
pub struct DavHttpClient {
    client: Client,
    credentials: Option<Credentials>,
    challenge: Mutex<Option<Challenge>>,
}

impl DavHttpClient {
    /// Creates a client from the connection settings.
    pub fn new(config: &CalDavConfig) -> CalDavResult<Self> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            CalDavError::network(format!("failed to create HTTP client: {}", e)).with_source(e)
        })?;

        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        };

        Ok(Self {
            client,
            credentials,
            challenge: Mutex::new(None),
        })
    }

    /// PROPFIND with the given depth; returns the multistatus body.
    pub fn propfind(&self, url: &str, body: &str, depth: u8) -> CalDavResult<String> {
        let request = DavRequest::new(dav_method("PROPFIND")?, url)
            .body(body, XML_CONTENT_TYPE)
            .header("Depth", depth.to_string());
        let response = self.execute(request)?;
        read_body(response)
    }

    /// REPORT at Depth 1; returns the multistatus body.
    pub fn report(&self, url: &str, body: &str) -> CalDavResult<String> {
        let request = DavRequest::new(dav_method("REPORT")?, url)
            .body(body, XML_CONTENT_TYPE)
            .header("Depth", "1");
        let response = self.execute(request)?;
        read_body(response)
    }

    /// GET a calendar object.
    pub fn get(&self, url: &str) -> CalDavResult<Fetched> {
        let response = self.execute(DavRequest::new(Method::GET, url))?;
        let etag = etag_header(&response);
        let body = read_body(response)?;
        Ok(Fetched { body, etag })
    }

    /// PUT an iCalendar payload; returns the new ETag when the server sends one.
    pub fn put(&self, url: &str, data: &str, condition: PutCondition<'_>) -> CalDavResult<Option<String>> {
        let mut request = DavRequest::new(Method::PUT, url).body(data, ICS_CONTENT_TYPE);
        match condition {
            PutCondition::None => {}
            PutCondition::CreateOnly => request = request.header("If-None-Match", "*"),
            PutCondition::IfMatch(etag) => request = request.header("If-Match", etag),
        }
        let response = self.execute(request)?;
        Ok(etag_header(&response))
    }

    /// DELETE a resource, conditional on `etag` when given.
    pub fn delete(&self, url: &str, etag: Option<&str>) -> CalDavResult<()> {
        let mut request = DavRequest::new(Method::DELETE, url);
        if let Some(etag) = etag {
            request = request.header("If-Match", etag);
        }
        self.execute(request)?;
        Ok(())
    }

    /// Sends a request, answering one authentication challenge if needed,
    /// and checks the final status.
    fn execute(&self, request: DavRequest<'_>) -> CalDavResult<Response> {
        let response = self.send(&request)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response);
        }

        let Some(header) = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
        else {
            return check_status(response);
        };

        if self.credentials.is_none() {
            return Err(CalDavError::authentication(
                "server requires authentication but no credentials are configured",
            ));
        }

        let Some(challenge) = Challenge::parse(&header) else {
            return Err(CalDavError::authentication(format!(
                "unsupported authentication scheme: {}",
                header
            )));
        };

        let already_tried = self.lock_challenge().is_some();
        if already_tried && !is_stale(&header) {
            // We sent credentials for a known scheme and they were refused.
            return check_status(response);
        }

        debug!(url = %request.url, "received 401, negotiating authentication");
        *self.lock_challenge() = Some(challenge);

        let retried = self.send(&request)?;
        check_status(retried)
    }

    fn send(&self, request: &DavRequest<'_>) -> CalDavResult<Response> {
        let mut builder = self.client.request(request.method.clone(), request.url);

        if let Some((body, content_type)) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.to_string());
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(authorization) = self.authorization(request) {
            builder = builder.header(reqwest::header::AUTHORIZATION, authorization);
        }

        trace!(method = %request.method, url = %request.url, "sending request");

        let response = builder.send().map_err(|e| {
            CalDavError::network(format!("{} {} failed: {}", request.method, request.url, e))
                .with_source(e)
        })?;

        trace!(status = %response.status(), "received response");
        Ok(response)
    }

    fn authorization(&self, request: &DavRequest<'_>) -> Option<String> {
        let credentials = self.credentials.as_ref()?;
        let mut challenge = self.lock_challenge();
        match challenge.as_mut()? {
            Challenge::Basic => Some(credentials.basic_header()),
            Challenge::Digest(digest) => {
                let uri = request_uri(request.url);
                Some(digest.authorize(request.method.as_str(), &uri, credentials))
            }
        }
    }

    fn lock_challenge(&self) -> std::sync::MutexGuard<'_, Option<Challenge>> {
        // The guarded value stays consistent even if a holder panicked.
        self.challenge
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn dav_method(name: &str) -> CalDavResult<Method> {
    Method::from_bytes(name.as_bytes())
        .map_err(|_| CalDavError::internal(format!("invalid HTTP method: {}", name)))
}

fn is_stale(header: &str) -> bool {
    header.to_ascii_lowercase().contains("stale=true")
}

/// Path and query of `url`, as used in the Digest `uri` parameter.
fn request_uri(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

fn etag_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(opaque_etag)
}

fn read_body(response: Response) -> CalDavResult<String> {
    response.text().map_err(|e| {
        CalDavError::network(format!("failed to read response: {}", e)).with_source(e)
    })
}

fn check_status(response: Response) -> CalDavResult<Response> {
    let status = response.status();
    if is_success(status) {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(status_error(status, &body))
}

fn is_success(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT | StatusCode::MULTI_STATUS
    )
}

/// Maps a failed status onto the error taxonomy.
fn status_error(status: StatusCode, body: &str) -> CalDavError {
    match status {
        StatusCode::UNAUTHORIZED => {
            CalDavError::authentication("authentication failed: invalid credentials")
        }
        StatusCode::FORBIDDEN => CalDavError::authorization("access denied"),
        StatusCode::NOT_FOUND => CalDavError::not_found("resource not found"),
        StatusCode::PRECONDITION_FAILED => {
            CalDavError::precondition_failed("resource was modified on the server")
        }
        StatusCode::TOO_MANY_REQUESTS => CalDavError::rate_limited("too many requests to server"),
        s if s.is_server_error() => CalDavError::server(format!("server error ({}): {}", s, body)),
        s => {
            warn!(status = %s, body = %body, "unexpected response status");
            CalDavError::invalid_response(format!("unexpected status {}: {}", s, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use std::time::Duration;

    #[test]
    fn client_creation() {
        let config = CalDavConfig::new("https://caldav.example.com/")
            .unwrap()
            .with_credentials("user", "pass")
            .with_timeout(Duration::from_secs(10));

        let client = DavHttpClient::new(&config).unwrap();
        assert!(client.credentials.is_some());
        assert!(client.lock_challenge().is_none());
    }

    #[test]
    fn client_without_credentials() {
        let config = CalDavConfig::new("https://caldav.example.com/").unwrap();
        let client = DavHttpClient::new(&config).unwrap();
        assert!(client.credentials.is_none());
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (StatusCode::UNAUTHORIZED, ErrorCode::AuthenticationFailed),
            (StatusCode::FORBIDDEN, ErrorCode::AuthorizationFailed),
            (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            (StatusCode::PRECONDITION_FAILED, ErrorCode::PreconditionFailed),
            (StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited),
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::ServerError),
            (StatusCode::BAD_GATEWAY, ErrorCode::ServerError),
            (StatusCode::CONFLICT, ErrorCode::InvalidResponse),
            (StatusCode::MOVED_PERMANENTLY, ErrorCode::InvalidResponse),
        ];

        for (status, code) in cases {
            assert_eq!(status_error(status, "").code(), code, "status {}", status);
        }
    }

    #[test]
    fn success_statuses() {
        assert!(is_success(StatusCode::OK));
        assert!(is_success(StatusCode::CREATED));
        assert!(is_success(StatusCode::NO_CONTENT));
        assert!(is_success(StatusCode::MULTI_STATUS));
        assert!(!is_success(StatusCode::ACCEPTED));
    }

    #[test]
    fn digest_uri_keeps_path_and_query() {
        assert_eq!(
            request_uri("https://dav.example.com/cal/a.ics"),
            "/cal/a.ics"
        );
        assert_eq!(request_uri("https://dav.example.com/x?y=1"), "/x?y=1");
    }

    #[test]
    fn stale_nonce_detection() {
        assert!(is_stale(r#"Digest realm="r", nonce="n2", stale=TRUE"#));
        assert!(!is_stale(r#"Digest realm="r", nonce="n2""#));
    }
}
