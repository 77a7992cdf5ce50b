//! The `agenda` command-line interface.
//!
//! Lists events across every Google calendar of the user, lists the
//! calendars themselves, and finds or creates a calendar by name.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{CliError, CliResult};
