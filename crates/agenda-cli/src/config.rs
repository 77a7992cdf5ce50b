//! CLI configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/agenda/config.toml` by default. Every field is optional.
//!
//! ```toml
//! client_secret_path = "client_secret.json"
//! token_path = "~/.credentials/calendar-nodejs-quickstart.json"
//! max_concurrency = 8
//! request_timeout_secs = 30
//!
//! [logging]
//! level = "warn"
//! format = "compact"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use agenda_core::{TracingConfig, TracingOutputFormat};
use agenda_providers::Aggregator;
use agenda_providers::google::GoogleConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Configuration for the agenda CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaConfig {
    /// Client secrets JSON downloaded from the Google Cloud Console.
    pub client_secret_path: PathBuf,

    /// Where the OAuth token is persisted. `~` is expanded.
    pub token_path: Option<PathBuf>,

    /// Upper bound on concurrent per-calendar requests.
    pub max_concurrency: usize,

    /// Timeout for every HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        Self {
            client_secret_path: PathBuf::from(GoogleConfig::DEFAULT_CLIENT_SECRET_FILE),
            token_path: None,
            max_concurrency: Aggregator::DEFAULT_MAX_CONCURRENCY,
            request_timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level for agenda's own targets (`RUST_LOG` still wins).
    pub level: String,

    /// Output format: `pretty`, `compact` or `json`.
    pub format: TracingOutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: TracingOutputFormat::Compact,
        }
    }
}

impl AgendaConfig {
    /// Loads configuration from the default path, or defaults if the file
    /// does not exist.
    pub fn load() -> CliResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            CliError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agenda")
    }

    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> CliResult<()> {
        if self.max_concurrency == 0 {
            return Err(CliError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CliError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        TracingConfig::default().with_level_name(&self.logging.level)?;
        Ok(())
    }

    /// Builds the Google backend configuration.
    pub fn to_google_config(&self) -> GoogleConfig {
        let mut config = GoogleConfig::new(expand_home(&self.client_secret_path))
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(expand_home(path));
        }
        config
    }

    /// Builds the tracing configuration; `debug` overrides the file.
    pub fn tracing_config(&self, debug: bool) -> CliResult<TracingConfig> {
        if debug {
            return Ok(TracingConfig::cli_debug());
        }
        Ok(TracingConfig::default()
            .with_level_name(&self.logging.level)?
            .with_format(self.logging.format))
    }
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
