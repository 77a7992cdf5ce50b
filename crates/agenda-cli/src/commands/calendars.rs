//! `agenda calendars`.

use agenda_core::Calendar;
use agenda_providers::CalendarApi;

use crate::error::CliResult;

/// Lists the calendars of the account.
pub async fn run(api: &dyn CalendarApi, json: bool) -> CliResult<String> {
    let calendars = api.list_calendars().await?;
    if json {
        Ok(serde_json::to_string_pretty(&calendars)?)
    } else {
        Ok(render_text(&calendars))
    }
}

/// One `id  summary` line per calendar, primary marked with `*`.
pub fn render_text(calendars: &[Calendar]) -> String {
    if calendars.is_empty() {
        return "No calendars found.".to_string();
    }

    calendars
        .iter()
        .map(|calendar| {
            let marker = if calendar.primary { "*" } else { " " };
            format!("{} {}  {}", marker, calendar.id, calendar.summary)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_primary() {
        let calendars = vec![
            Calendar::new("me@example.com", "Personal").with_primary(true),
            Calendar::new("team@group.calendar.google.com", "Team"),
        ];
        let text = render_text(&calendars);
        assert_eq!(
            text,
            "* me@example.com  Personal\n  team@group.calendar.google.com  Team"
        );
    }

    #[test]
    fn empty_list() {
        assert_eq!(render_text(&[]), "No calendars found.");
    }
}
