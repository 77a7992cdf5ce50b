//! Command-line interface definition.

use std::path::PathBuf;

use agenda_core::{TimeWindow, parse_instant};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand};

use crate::error::{CliError, CliResult};

/// Days covered by `--from`/`--to` windows when no end is given.
const DEFAULT_WINDOW_DAYS: u32 = 7;

/// agenda - events from all your Google calendars
#[derive(Debug, Parser)]
#[command(name = "agenda")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "AGENDA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Returns the command to run; `events` with no filter when omitted.
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Events(EventsArgs::default()))
    }
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List events from every calendar (default)
    Events(EventsArgs),

    /// List the calendars of the account
    Calendars {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the ID of the calendar with this name, creating it if needed
    EnsureCalendar {
        /// Exact calendar name (case-sensitive)
        name: String,
    },

    /// Authorize access to Google Calendar
    Auth {
        /// Discard the stored token and authorize again
        #[arg(long, short)]
        force: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of the `events` command.
#[derive(Debug, Clone, Default, Args)]
pub struct EventsArgs {
    /// Window start (YYYY-MM-DD or RFC 3339); defaults to now
    #[arg(long)]
    pub from: Option<String>,

    /// Window end (YYYY-MM-DD or RFC 3339)
    #[arg(long, conflicts_with = "days")]
    pub to: Option<String>,

    /// Window length in days from the start
    #[arg(long)]
    pub days: Option<u32>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl EventsArgs {
    /// Resolves the requested time window.
    ///
    /// No flag at all means no window: every event of every calendar.
    pub fn window(&self, now: DateTime<Utc>) -> CliResult<Option<TimeWindow>> {
        if self.from.is_none() && self.to.is_none() && self.days.is_none() {
            return Ok(None);
        }

        let start = match &self.from {
            Some(from) => parse_arg("--from", from)?,
            None => now,
        };
        let end = match &self.to {
            Some(to) => parse_arg("--to", to)?,
            None => start + Duration::days(i64::from(self.days.unwrap_or(DEFAULT_WINDOW_DAYS))),
        };

        TimeWindow::try_new(start, end).map(Some).ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "window end {} is before its start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            ))
        })
    }
}

fn parse_arg(flag: &str, value: &str) -> CliResult<DateTime<Utc>> {
    parse_instant(value).ok_or_else(|| {
        CliError::InvalidArgument(format!(
            "{} expects YYYY-MM-DD or an RFC 3339 timestamp, got '{}'",
            flag, value
        ))
    })
}

/// Configuration actions.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
