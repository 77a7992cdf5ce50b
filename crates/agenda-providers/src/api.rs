//! CalendarApi trait definition.
//!
//! [`CalendarApi`] is the typed seam between the remote calendar service and
//! the rest of the crate. The [`Aggregator`](crate::Aggregator) only talks to
//! this trait, so it can run against the Google client or a test double.

use std::future::Future;
use std::pin::Pin;

use agenda_core::{Calendar, Event, TimeWindow};

use crate::error::CalendarResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe, so it can be shared as
/// `Arc<dyn CalendarApi>` across spawned tasks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Remote calendar operations.
///
/// Every method performs a single logical remote operation (implementations
/// follow pagination internally) and reports failures as
/// [`CalendarError`](crate::CalendarError) values; none of them retry.
pub trait CalendarApi: Send + Sync {
    /// Lists the calendars in the user's calendar list.
    fn list_calendars(&self) -> BoxFuture<'_, CalendarResult<Vec<Calendar>>>;

    /// Lists events of one calendar, optionally restricted to a window.
    ///
    /// A calendar without matching events yields an empty `Vec`.
    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: Option<TimeWindow>,
    ) -> BoxFuture<'a, CalendarResult<Vec<Event>>>;

    /// Creates a new secondary calendar with the given display name.
    fn create_calendar<'a>(&'a self, name: &'a str) -> BoxFuture<'a, CalendarResult<Calendar>>;
}
