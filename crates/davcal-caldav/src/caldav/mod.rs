//! CalDAV transport over HTTP.
//!
//! # Features
//!
//! - HTTP Digest and Basic authentication
//! - PROPFIND for principal, calendar home and collection discovery
//! - REPORT calendar-query with time-range filtering and recurrence expansion
//! - conditional PUT/DELETE with ETags
//!
//! # Example
//!
//! ```ignore
//! use davcal_caldav::{CalDavConfig, CalendarTransport, caldav::CalDavTransport};
//!
//! let config = CalDavConfig::new("https://dav.example.com/remote.php/dav/")?
//!     .with_credentials("alice", "password");
//!
//! let transport = CalDavTransport::new(&config)?;
//! let calendars = transport.discover_calendars()?;
//! ```

mod auth;
mod http;
mod transport;
mod xml;

pub use transport::CalDavTransport;
