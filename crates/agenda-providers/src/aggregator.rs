//! Cross-calendar queries.
//!
//! The [`Aggregator`] lists the user's calendars and then fans out one events
//! query per calendar, bounded by a semaphore. The calendar listing is the
//! only step whose failure aborts the whole operation; a failing calendar
//! contributes zero events and is reported in [`FanOutReport::failures`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn};

use agenda_core::{Calendar, Event, TimeWindow};

use crate::api::CalendarApi;
use crate::error::{CalendarError, CalendarResult};

/// A calendar whose events query failed during a fan-out.
#[derive(Debug)]
pub struct CalendarFailure {
    /// The calendar that was being queried.
    pub calendar: Calendar,
    /// Why the query failed.
    pub error: CalendarError,
}

/// Outcome of a fan-out over all calendars.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Events from every calendar that answered, in completion order.
    pub events: Vec<Event>,
    /// Calendars whose query failed.
    pub failures: Vec<CalendarFailure>,
    /// Number of calendars queried.
    pub calendar_count: usize,
}

/// Orchestrates queries spanning all of the user's calendars.
#[derive(Clone)]
pub struct Aggregator {
    api: Arc<dyn CalendarApi>,
    max_concurrency: usize,
}

impl Aggregator {
    /// Default number of concurrent per-calendar queries.
    pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

    /// Creates an aggregator over the given API.
    pub fn new(api: Arc<dyn CalendarApi>) -> Self {
        Self {
            api,
            max_concurrency: Self::DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Sets the fan-out width. Values below 1 are raised to 1.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Returns the fan-out width.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Fetches events from every calendar, optionally within a window.
    ///
    /// Fails only if the calendar list cannot be fetched. Ordering across
    /// calendars is unspecified; within a calendar it is the server's order.
    pub async fn all_events(&self, window: Option<TimeWindow>) -> CalendarResult<Vec<Event>> {
        Ok(self.all_events_report(window).await?.events)
    }

    /// Like [`Aggregator::all_events`], but also returns the absorbed failures.
    pub async fn all_events_report(
        &self,
        window: Option<TimeWindow>,
    ) -> CalendarResult<FanOutReport> {
        let calendars = self.api.list_calendars().await?;
        debug!(
            calendars = calendars.len(),
            max_concurrency = self.max_concurrency,
            "fetching events from all calendars"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();
        let mut report = FanOutReport {
            calendar_count: calendars.len(),
            ..FanOutReport::default()
        };

        let mut pending: HashMap<task::Id, Calendar> = HashMap::new();
        for calendar in calendars {
            let api = Arc::clone(&self.api);
            let semaphore = Arc::clone(&semaphore);
            let calendar_id = calendar.id.clone();

            let handle = join_set.spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(_permit) => api.list_events(&calendar_id, window).await,
                    Err(_) => Err(CalendarError::internal("fan-out semaphore closed")),
                }
            });
            pending.insert(handle.id(), calendar);
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_error) => {
                    let error = CalendarError::internal(format!(
                        "calendar events task did not complete: {}",
                        join_error
                    ));
                    (join_error.id(), Err(error))
                }
            };
            let Some(calendar) = pending.remove(&id) else {
                continue;
            };

            match result {
                Ok(events) => {
                    debug!(
                        calendar = %calendar.id,
                        events = events.len(),
                        "calendar events fetched"
                    );
                    report.events.extend(events);
                }
                Err(error) => {
                    warn!(
                        calendar = %calendar.id,
                        error = %error,
                        "failed to fetch calendar events, skipping calendar"
                    );
                    report.failures.push(CalendarFailure { calendar, error });
                }
            }
        }

        info!(
            events = report.events.len(),
            failed = report.failures.len(),
            calendars = report.calendar_count,
            "aggregated calendar events"
        );
        Ok(report)
    }

    /// Returns the first calendar named exactly `name`, creating it if absent.
    ///
    /// When several calendars share the name, the first in listing order wins.
    pub async fn find_or_create_calendar(&self, name: &str) -> CalendarResult<Calendar> {
        let calendars = self.api.list_calendars().await?;

        if let Some(existing) = calendars.into_iter().find(|c| c.summary == name) {
            debug!(calendar = %existing.id, name, "found existing calendar");
            return Ok(existing);
        }

        info!(name, "calendar not found, creating it");
        self.api.create_calendar(name).await
    }
}
