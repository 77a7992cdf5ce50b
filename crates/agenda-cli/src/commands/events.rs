//! `agenda events`.

use agenda_core::{Event, EventTime};
use agenda_providers::{Aggregator, FanOutReport};
use chrono::{Local, Utc};

use crate::cli::EventsArgs;
use crate::error::CliResult;

/// Fetches events from every calendar and renders them sorted by start.
///
/// Calendars that failed are reported on stderr; they do not fail the
/// command.
pub async fn run(aggregator: &Aggregator, args: &EventsArgs) -> CliResult<String> {
    let window = args.window(Utc::now())?;
    let FanOutReport {
        mut events,
        failures,
        ..
    } = aggregator.all_events_report(window).await?;

    for failure in &failures {
        eprintln!(
            "warning: skipped calendar '{}': {}",
            failure.calendar.summary, failure.error
        );
    }

    sort_events(&mut events);
    if args.json {
        Ok(serde_json::to_string_pretty(&events)?)
    } else {
        Ok(render_text(&events))
    }
}

/// Orders events by start, then end, then title.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.end.cmp(&b.end))
            .then_with(|| a.summary.cmp(&b.summary))
    });
}

/// One line per event, in local time.
pub fn render_text(events: &[Event]) -> String {
    if events.is_empty() {
        return "No upcoming events found.".to_string();
    }

    events
        .iter()
        .map(|event| {
            let title = if event.summary.is_empty() {
                "(no title)"
            } else {
                event.summary.as_str()
            };
            format!("{}  {}", format_start(&event.start), title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_start(start: &EventTime) -> String {
    match start {
        EventTime::AllDay(date) => format!("{} (all day)", date.format("%Y-%m-%d")),
        EventTime::DateTime(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    }
}
