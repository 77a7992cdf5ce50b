//! agenda CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use agenda_cli::cli::{Cli, Command, ConfigAction};
use agenda_cli::commands::{self, Session};
use agenda_cli::config::AgendaConfig;
use agenda_cli::error::CliResult;
use agenda_core::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<String> {
    let config_path = cli.config.clone().unwrap_or_else(AgendaConfig::default_path);
    let config = match cli.config {
        Some(ref path) => AgendaConfig::load_from(path)?,
        None => AgendaConfig::load()?,
    };

    init_tracing(config.tracing_config(cli.debug)?)?;
    debug!(config = %config_path.display(), "configuration loaded");

    match cli.command_or_default() {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
        Command::Events(args) => {
            config.validate()?;
            let session = Session::connect(&config)?;
            commands::events::run(&session.aggregator, &args).await
        }
        Command::Calendars { json } => {
            config.validate()?;
            let session = Session::connect(&config)?;
            commands::calendars::run(session.api.as_ref(), json).await
        }
        Command::EnsureCalendar { name } => {
            config.validate()?;
            let session = Session::connect(&config)?;
            commands::ensure_calendar::run(&session.aggregator, &name).await
        }
        Command::Auth { force } => {
            config.validate()?;
            let session = Session::connect(&config)?;
            commands::auth::run(&session.auth, force).await
        }
    }
}
