//! Calendar client configuration.

use std::time::Duration;

use chrono_tz::Tz;
use url::Url;

/// Configuration for connecting a [`CalendarClient`](crate::CalendarClient).
#[derive(Debug, Clone)]
pub struct CalDavConfig {
    /// Server URL: the service root, a principal, or a calendar home.
    pub url: Url,

    /// Username for authentication.
    pub username: Option<String>,

    /// Password for authentication.
    pub password: Option<String>,

    /// Zone that decoded timestamps are expressed in.
    pub local_timezone: Tz,

    /// Picks a collection by display name or path instead of the first one.
    pub calendar_hint: Option<String>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout. `None` keeps the HTTP client's default.
    pub timeout: Option<Duration>,

    /// User agent string.
    pub user_agent: String,
}

impl CalDavConfig {
    /// Creates a configuration for the given server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(url.as_ref())?;
        Ok(Self {
            url: parsed,
            username: None,
            password: None,
            local_timezone: Tz::UTC,
            calendar_hint: None,
            verify_tls: true,
            timeout: None,
            user_agent: format!("davcal/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Sets the credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the zone used for decoded timestamps and day boundaries.
    pub fn with_local_timezone(mut self, tz: Tz) -> Self {
        self.local_timezone = tz;
        self
    }

    /// Sets the calendar hint (display name or path fragment).
    pub fn with_calendar_hint(mut self, hint: impl Into<String>) -> Self {
        self.calendar_hint = Some(hint.into());
        self
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the server URL as a string.
    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// Returns true if credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}
