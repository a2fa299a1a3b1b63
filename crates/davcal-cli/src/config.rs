//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/davcal/config.toml` by default:
//!
//! ```toml
//! debug = false
//!
//! [caldav]
//! url = "https://dav.example.com/remote.php/dav/"
//! username = "alice"
//! password = "pass::dav/alice"
//! timezone = "Europe/Berlin"
//! calendar = "personal"
//! ```
//!
//! `username` and `password` support secret references (see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use davcal_caldav::CalDavConfig;

use crate::secret;

/// Configuration for the davcal client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server settings.
    pub caldav: Option<CalDavSettings>,

    /// Debug mode.
    pub debug: bool,
}

/// CalDAV server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalDavSettings {
    /// Server URL: service root, principal or calendar home.
    pub url: String,

    /// Username (supports `pass::` and `env::` prefixes).
    pub username: Option<String>,

    /// Password (supports `pass::` and `env::` prefixes).
    pub password: Option<String>,

    /// IANA zone for displayed times and day boundaries. UTC when unset.
    pub timezone: Option<String>,

    /// Display name or path fragment of the calendar to use.
    pub calendar: Option<String>,

    /// Whether to verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

fn default_verify_tls() -> bool {
    true
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if it is absent.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("davcal")
            .join("config.toml")
    }

    /// Returns the server settings or explains how to add them.
    pub fn caldav(&self) -> Result<&CalDavSettings, String> {
        self.caldav.as_ref().ok_or_else(|| {
            format!(
                "no [caldav] section found. Add to {}:\n  \
                 [caldav]\n  \
                 url = \"https://dav.example.com/remote.php/dav/\"\n  \
                 username = \"alice\"\n  \
                 password = \"env::DAVCAL_PASSWORD\"",
                Self::default_path().display()
            )
        })
    }

    /// Copy with inline passwords masked, for printing.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(caldav) = copy.caldav.as_mut() {
            let inline = caldav
                .password
                .as_deref()
                .is_some_and(|p| !secret::is_reference(p));
            if inline {
                caldav.password = Some("<redacted>".to_string());
            }
        }
        copy
    }
}

impl CalDavSettings {
    /// Resolves secrets and the time zone into a library configuration.
    pub fn to_client_config(&self) -> Result<CalDavConfig, String> {
        let mut config = CalDavConfig::new(&self.url)
            .map_err(|e| format!("invalid url `{}`: {}", self.url, e))?
            .with_local_timezone(self.local_timezone()?);

        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                let username = secret::resolve(username)
                    .map_err(|e| format!("failed to resolve username: {}", e))?;
                let password = secret::resolve(password)
                    .map_err(|e| format!("failed to resolve password: {}", e))?;
                config = config.with_credentials(username, password);
            }
            (None, None) => {}
            _ => return Err("username and password must be set together".to_string()),
        }

        if let Some(ref calendar) = self.calendar {
            config = config.with_calendar_hint(calendar);
        }
        if !self.verify_tls {
            config = config.with_insecure_tls();
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Parses the configured zone name.
    pub fn local_timezone(&self) -> Result<Tz, String> {
        match self.timezone {
            Some(ref name) => name
                .parse::<Tz>()
                .map_err(|_| format!("unknown timezone `{}`", name)),
            None => Ok(Tz::UTC),
        }
    }
}
