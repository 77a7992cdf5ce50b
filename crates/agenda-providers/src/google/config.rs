//! Google Calendar configuration and client secrets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CalendarError, CalendarResult};

/// Redirect URI used when the secrets file does not list one.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// OAuth 2.0 client application credentials.
///
/// Loaded from the JSON downloaded from the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Where Google sends the user after consent (`redirect_uris[0]`).
    pub redirect_uri: String,
}

/// Structure of Google's client secrets JSON file.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsSection>,
    web: Option<ClientSecretsSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ClientSecrets {
    /// Creates client secrets from their parts.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Loads client secrets from a Google Cloud Console JSON file.
    ///
    /// Any read or parse failure is a configuration error.
    pub fn from_file(path: impl AsRef<Path>) -> CalendarResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CalendarError::configuration(format!(
                "failed to read client secrets {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses client secrets from the JSON content of a secrets file.
    ///
    /// The `installed` section is preferred, `web` is accepted as well.
    pub fn from_json(json: &str) -> CalendarResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| {
            CalendarError::configuration(format!("failed to parse client secrets: {}", e))
                .with_source(e)
        })?;

        let section = file.installed.or(file.web).ok_or_else(|| {
            CalendarError::configuration("client secrets must contain an 'installed' section")
        })?;

        if section.client_id.is_empty() || section.client_secret.is_empty() {
            return Err(CalendarError::configuration(
                "client secrets have an empty client_id or client_secret",
            ));
        }

        let redirect_uri = section
            .redirect_uris
            .into_iter()
            .next()
            .unwrap_or_else(|| OOB_REDIRECT_URI.to_string());

        Ok(Self::new(section.client_id, section.client_secret, redirect_uri))
    }
}

/// Configuration for the Google Calendar backend.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Path to the client secrets JSON file.
    pub client_secret_path: PathBuf,

    /// Path of the persisted token.
    ///
    /// Defaults to `~/.credentials/calendar-nodejs-quickstart.json`.
    pub token_path: PathBuf,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Timeout applied to every HTTP request.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read/write calendar access.
    pub const SCOPE_CALENDAR: &'static str = "https://www.googleapis.com/auth/calendar";

    /// Read-only calendar access.
    pub const SCOPE_CALENDAR_READONLY: &'static str =
        "https://www.googleapis.com/auth/calendar.readonly";

    /// Default client secrets file, relative to the working directory.
    pub const DEFAULT_CLIENT_SECRET_FILE: &'static str = "client_secret.json";

    /// Creates a configuration reading client secrets from `client_secret_path`.
    pub fn new(client_secret_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_path: Self::default_token_path(),
            scopes: vec![
                Self::SCOPE_CALENDAR.to_string(),
                Self::SCOPE_CALENDAR_READONLY.to_string(),
            ],
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("agenda/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Returns the default token path inside the user's home directory.
    pub fn default_token_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".credentials")
            .join("calendar-nodejs-quickstart.json")
    }

    /// Sets the token storage path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CalendarResult<()> {
        if self.scopes.is_empty() {
            return Err(CalendarError::configuration(
                "at least one OAuth scope is required",
            ));
        }
        if self.timeout.is_zero() {
            return Err(CalendarError::configuration("request timeout must be positive"));
        }
        Ok(())
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CLIENT_SECRET_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalendarErrorCode;

    #[test]
    fn secrets_from_installed_section() {
        let json = r#"{
            "installed": {
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "s3cret",
                "project_id": "agenda",
                "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://localhost"]
            }
        }"#;

        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret, "s3cret");
        assert_eq!(secrets.redirect_uri, "urn:ietf:wg:oauth:2.0:oob");
    }

    #[test]
    fn secrets_from_web_section() {
        let json = r#"{
            "web": {
                "client_id": "web-id",
                "client_secret": "web-secret",
                "redirect_uris": ["http://localhost:8080/callback"]
            }
        }"#;

        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.redirect_uri, "http://localhost:8080/callback");
    }

    #[test]
    fn secrets_without_redirect_uris_use_oob() {
        let json = r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.redirect_uri, OOB_REDIRECT_URI);
    }

    #[test]
    fn secrets_malformed_json() {
        let err = ClientSecrets::from_json("{ not json").unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::ConfigurationError);
        assert!(err.message().contains("parse"));
    }

    #[test]
    fn secrets_missing_section() {
        let err = ClientSecrets::from_json(r#"{"other": {}}"#).unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::ConfigurationError);
        assert!(err.message().contains("installed"));
    }

    #[test]
    fn secrets_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ClientSecrets::from_file(tmp.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::ConfigurationError);
    }

    #[test]
    fn config_defaults() {
        let config = GoogleConfig::default();
        assert_eq!(config.client_secret_path, PathBuf::from("client_secret.json"));
        assert!(
            config
                .token_path
                .ends_with(".credentials/calendar-nodejs-quickstart.json")
        );
        assert_eq!(config.scopes.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        let config = GoogleConfig::default().with_scopes(vec![]);
        assert!(config.validate().is_err());

        let config = GoogleConfig::default().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
