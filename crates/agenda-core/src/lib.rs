//! Core types: calendars, events, time windows, tracing

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{Calendar, Event};
pub use time::{EventTime, TimeWindow, parse_instant};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
