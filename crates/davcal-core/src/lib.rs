//! Core types: simplified events, calendar times, tracing setup

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{Event, EventDetails, UNTITLED_EVENT};
pub use time::{CalendarTime, TimeWindow, add_whole_days, midnight_utc, wall_clock_in};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
