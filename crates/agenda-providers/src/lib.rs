//! Calendar access for agenda.
//!
//! - [`CalendarApi`] - the remote operations the rest of the tool relies on
//! - [`Aggregator`] - concurrent fan-out over every calendar, plus
//!   find-or-create by name
//! - [`google`] - the Google Calendar v3 implementation and its OAuth
//!   machinery
//! - [`CalendarError`] - error type shared by all of the above
//!
//! ```text
//!  ┌───────────────┐     ┌──────────────────────┐     ┌───────────────┐
//!  │  Aggregator   │────▶│ GoogleCalendarClient │────▶│ Authenticator │
//!  └───────────────┘     └──────────────────────┘     └───────┬───────┘
//!                              CalendarApi                    │
//!                                                    TokenStore / TokenEndpoint
//!                                                        / CodePrompt
//! ```

pub mod aggregator;
pub mod api;
pub mod error;
#[cfg(feature = "google")]
pub mod google;

pub use aggregator::{Aggregator, CalendarFailure, FanOutReport};
pub use api::{BoxFuture, CalendarApi};
pub use error::{CalendarError, CalendarErrorCode, CalendarResult};
