//! `agenda ensure-calendar`.

use agenda_providers::Aggregator;
use tracing::info;

use crate::error::{CliError, CliResult};

/// Prints the ID of the calendar named `name`, creating it when missing.
pub async fn run(aggregator: &Aggregator, name: &str) -> CliResult<String> {
    if name.trim().is_empty() {
        return Err(CliError::InvalidArgument(
            "calendar name must not be empty".to_string(),
        ));
    }

    let calendar = aggregator.find_or_create_calendar(name).await?;
    info!(calendar = %calendar.id, name, "calendar ready");
    Ok(calendar.id)
}
