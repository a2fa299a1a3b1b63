//! Calendar client over CalDAV.
//!
//! - [`CalendarClient`] - binds one calendar collection and exposes queries,
//!   creation, renaming and deletion of events
//! - [`CalendarTransport`] - the protocol seam; [`caldav::CalDavTransport`]
//!   speaks WebDAV/CalDAV over HTTP
//! - [`CalendarCodec`] - the format seam; [`IcsCodec`] reads and writes
//!   iCalendar
//! - [`CalDavError`] - error type shared by every layer
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────┐
//!   │  CalendarClient  │── Event / EventDetails
//!   └───┬──────────┬───┘
//!       │          │
//!       ▼          ▼
//! ┌───────────┐ ┌──────────┐
//! │ Transport │ │  Codec   │
//! └─────┬─────┘ └────┬─────┘
//!       │            │
//!       ▼            ▼
//!  CalDAV server   iCalendar text
//! ```
//!
//! # Example
//!
//! ```ignore
//! use davcal_caldav::{CalDavConfig, CalendarClient};
//!
//! let config = CalDavConfig::new("https://dav.example.com/remote.php/dav/")?
//!     .with_credentials("alice", "password")
//!     .with_local_timezone(chrono_tz::Europe::Berlin);
//!
//! let client = CalendarClient::connect(config)?;
//! let today = client.get_events_for_date(chrono::Local::now().date_naive())?;
//! ```

#[cfg(feature = "caldav")]
pub mod caldav;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod ics;
pub mod transport;

#[cfg(feature = "caldav")]
pub use client::CalDavClient;
pub use client::CalendarClient;
pub use codec::{CalendarCodec, EventComponent};
pub use config::CalDavConfig;
pub use error::{CalDavError, CalDavResult, ErrorCode};
pub use ics::IcsCodec;
pub use transport::{CalendarHandle, CalendarObject, CalendarTransport};

pub use davcal_core::{Event, EventDetails};
