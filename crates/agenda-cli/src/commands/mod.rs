//! Command implementations.
//!
//! Commands return their rendered stdout text; `main` prints it.

pub mod auth;
pub mod calendars;
pub mod config;
pub mod ensure_calendar;
pub mod events;

use std::sync::Arc;

use agenda_providers::google::{Authenticator, GoogleCalendarClient};
use agenda_providers::{Aggregator, CalendarApi};

use crate::config::AgendaConfig;
use crate::error::CliResult;

/// The authenticated Google backend wired from configuration.
pub struct Session {
    /// Credential provider shared by every API call.
    pub auth: Arc<Authenticator>,
    /// Calendar API client.
    pub api: Arc<dyn CalendarApi>,
    /// Fan-out over all calendars.
    pub aggregator: Aggregator,
}

impl Session {
    /// Builds the backend. Nothing touches the network until a command runs.
    pub fn connect(config: &AgendaConfig) -> CliResult<Self> {
        let google = config.to_google_config();
        let auth = Arc::new(Authenticator::new(google.clone())?);
        let client = GoogleCalendarClient::new(Arc::clone(&auth), &google)?;

        let api: Arc<dyn CalendarApi> = Arc::new(client);
        let aggregator =
            Aggregator::new(Arc::clone(&api)).with_max_concurrency(config.max_concurrency);

        Ok(Self {
            auth,
            api,
            aggregator,
        })
    }
}
