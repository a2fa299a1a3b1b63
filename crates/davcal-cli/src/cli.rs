//! Command-line interface definition.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};

/// davcal - your CalDAV calendar from the terminal
#[derive(Debug, Parser)]
#[command(name = "davcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "DAVCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output events as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show today's events
    Today,

    /// Show the events of one day
    Day {
        /// Date as YYYY-MM-DD
        date: NaiveDate,
    },

    /// Show the events between two points in time
    Range {
        /// Start, as YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS] or RFC 3339
        start: TimeArg,
        /// End, in the same formats
        end: TimeArg,
    },

    /// Show the next upcoming event
    Next,

    /// Find events whose title contains the given text
    Search {
        /// Text to look for, case-insensitive
        title: String,
    },

    /// Create an event
    Create {
        /// Event title
        title: String,

        /// Start, as YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS] or RFC 3339
        start: TimeArg,

        /// Length in minutes (default 60 for timed events)
        #[arg(long, conflicts_with = "days")]
        minutes: Option<i64>,

        /// Length in days (default 1 for all-day events)
        #[arg(long)]
        days: Option<i64>,

        /// Create an all-day event
        #[arg(long)]
        all_day: bool,
    },

    /// Delete the event stored at a URL
    Delete {
        /// Event URL as printed by the listing commands
        url: String,
    },

    /// Rename the event stored at a URL
    Rename {
        /// Event URL as printed by the listing commands
        url: String,
        /// New title
        title: String,
    },

    /// List the calendars of the account
    Calendars,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

/// A point in time given on the command line.
///
/// Values with an offset are absolute; dates and wall-clock times are read in
/// the configured zone once it is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeArg {
    Absolute(DateTime<FixedOffset>),
    Local(NaiveDateTime),
}

impl TimeArg {
    /// Pins the value to `tz`.
    pub fn in_zone(&self, tz: Tz) -> DateTime<Tz> {
        match self {
            Self::Absolute(dt) => dt.with_timezone(&tz),
            Self::Local(naive) => davcal_core::time::resolve_local(&tz, naive),
        }
    }
}

impl FromStr for TimeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Absolute(dt));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(Self::Local(naive));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::Local(date.and_time(NaiveTime::MIN)));
        }
        Err(format!(
            "invalid time `{}`: expected YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS] or RFC 3339",
            s
        ))
    }
}
