//! Google Calendar API client.
//!
//! Thin typed wrapper over the Calendar v3 REST endpoints. Every call asks
//! the [`Authenticator`] for a credential on its own, so a client can be
//! shared across tasks without coordinating tokens.

use std::sync::Arc;

use agenda_core::{Calendar, Event, EventTime, TimeWindow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::authenticator::Authenticator;
use super::config::GoogleConfig;
use crate::api::{BoxFuture, CalendarApi};
use crate::error::{CalendarError, CalendarResult};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
    auth: Arc<Authenticator>,
}

impl GoogleCalendarClient {
    /// Creates a client using `auth` for credentials and `config` for the
    /// HTTP timeout and user agent.
    pub fn new(auth: Arc<Authenticator>, config: &GoogleConfig) -> CalendarResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                CalendarError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            base_url: CALENDAR_API_BASE.to_string(),
            auth,
        })
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the authenticator used by this client.
    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    /// Sends an authorized request and decodes the JSON response.
    async fn execute<T, F>(&self, build: F) -> CalendarResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let token = self.auth.credential().await?;

        let response = build(&self.http_client)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                CalendarError::transport(message).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            CalendarError::transport(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                self.auth.invalidate();
            }
            let message = api_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(CalendarError::remote(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            CalendarError::invalid_response(format!("failed to parse response: {}", e))
                .with_source(e)
        })
    }

    async fn list_calendars_impl(&self) -> CalendarResult<Vec<Calendar>> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: CalendarListResponse = self
                .execute(|http| {
                    let request = http.get(&url);
                    match &page_token {
                        Some(token) => request.query(&[("pageToken", token.as_str())]),
                        None => request,
                    }
                })
                .await?;

            calendars.extend(page.items.into_iter().map(Calendar::from));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = calendars.len(), "fetched calendar list");
        Ok(calendars)
    }

    async fn list_events_impl(
        &self,
        calendar_id: &str,
        window: Option<TimeWindow>,
    ) -> CalendarResult<Vec<Event>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );

        let mut query = vec![
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if let Some(window) = window {
            query.push(("timeMin", window.start.to_rfc3339()));
            query.push(("timeMax", window.end.to_rfc3339()));
        }

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: EventListResponse = self
                .execute(|http| {
                    let request = http.get(&url).query(&query);
                    match &page_token {
                        Some(token) => request.query(&[("pageToken", token.as_str())]),
                        None => request,
                    }
                })
                .await?;

            events.extend(
                page.items
                    .into_iter()
                    .filter_map(|event| convert_event(event, calendar_id)),
            );

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(calendar_id, count = events.len(), "fetched events");
        Ok(events)
    }

    async fn create_calendar_impl(&self, name: &str) -> CalendarResult<Calendar> {
        let url = format!("{}/calendars", self.base_url);
        let body = serde_json::json!({ "summary": name });

        let created: ApiCalendar = self.execute(|http| http.post(&url).json(&body)).await?;
        let calendar = Calendar::from(created);
        debug!(calendar_id = %calendar.id, name, "created calendar");
        Ok(calendar)
    }
}

impl CalendarApi for GoogleCalendarClient {
    fn list_calendars(&self) -> BoxFuture<'_, CalendarResult<Vec<Calendar>>> {
        Box::pin(self.list_calendars_impl())
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: Option<TimeWindow>,
    ) -> BoxFuture<'a, CalendarResult<Vec<Event>>> {
        Box::pin(self.list_events_impl(calendar_id, window))
    }

    fn create_calendar<'a>(&'a self, name: &'a str) -> BoxFuture<'a, CalendarResult<Calendar>> {
        Box::pin(self.create_calendar_impl(name))
    }
}

/// Extracts the human-readable message from a Google error body.
///
/// Handles `{"error": {"message": ..., "errors": [...]}}` and the bare
/// `{"error": "...", "error_description": "..."}` form.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    if let Some(message) = error
        .get("errors")
        .and_then(|errors| errors.get(0))
        .and_then(|first| first.get("message"))
        .and_then(|m| m.as_str())
    {
        return Some(message.to_string());
    }
    error.as_str().map(|code| {
        match value.get("error_description").and_then(|d| d.as_str()) {
            Some(description) => format!("{}: {}", code, description),
            None => code.to_string(),
        }
    })
}

/// Converts an API event, skipping cancelled or unusable entries.
fn convert_event(event: ApiEvent, calendar_id: &str) -> Option<Event> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id?;
    let Some(start) = parse_event_time(&event.start) else {
        warn!(event_id = %id, "event has no usable start time, skipping");
        return None;
    };
    let Some(end) = parse_event_time(&event.end) else {
        warn!(event_id = %id, "event has no usable end time, skipping");
        return None;
    };

    let mut converted = Event::new(
        id,
        calendar_id,
        event.summary.unwrap_or_default(),
        start,
        end,
    );
    converted.location = event.location;
    converted.description = event.description;
    converted.html_link = event.html_link;
    converted.status = event.status;
    Some(converted)
}

fn parse_event_time(time: &ApiEventTime) -> Option<EventTime> {
    match (&time.date_time, &time.date) {
        (Some(dt), _) => DateTime::parse_from_rfc3339(dt)
            .map_err(|e| warn!("failed to parse event time {}: {}", dt, e))
            .ok()
            .map(|parsed| EventTime::from_utc(parsed.with_timezone(&Utc))),
        (None, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| warn!("failed to parse event date {}: {}", date, e))
            .ok()
            .map(EventTime::from_date),
        (None, None) => None,
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
    html_link: Option<String>,
    status: Option<String>,
}

/// Event time from the API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

/// Response from the calendarList endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<ApiCalendar>,
    next_page_token: Option<String>,
}

/// A calendar list entry, or the body returned by calendars.insert.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCalendar {
    id: String,
    #[serde(default)]
    summary: String,
    description: Option<String>,
    time_zone: Option<String>,
    #[serde(default)]
    primary: bool,
}

impl From<ApiCalendar> for Calendar {
    fn from(entry: ApiCalendar) -> Self {
        let mut calendar = Calendar::new(entry.id, entry.summary).with_primary(entry.primary);
        calendar.description = entry.description;
        calendar.time_zone = entry.time_zone;
        calendar
    }
}
