//! OAuth token record and its on-disk store.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CalendarError, CalendarResult};

/// Seconds shaved off the server-reported lifetime so tokens are refreshed
/// before the server starts rejecting them.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An OAuth token set: the in-memory credential and its persisted form.
///
/// Also reads the record written by Google's Node.js quickstart
/// (`expiry_date` in epoch milliseconds, space-separated `scope`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TokenRecord")]
pub struct TokenInfo {
    /// The bearer token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires (already reduced by a safety margin).
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// Token type reported by the server, normally `Bearer`.
    pub token_type: String,

    /// When the tokens were last obtained or refreshed.
    pub last_refresh: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// On-disk token record, in either our layout or the quickstart one.
#[derive(Deserialize)]
struct TokenRecord {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    /// Epoch milliseconds, not reduced by the margin.
    #[serde(default)]
    expiry_date: Option<i64>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    last_refresh: Option<DateTime<Utc>>,
}

impl From<TokenRecord> for TokenInfo {
    fn from(record: TokenRecord) -> Self {
        let expires_at = record.expires_at.or_else(|| {
            record
                .expiry_date
                .and_then(DateTime::from_timestamp_millis)
                .map(|expiry| expiry - Duration::seconds(EXPIRY_MARGIN_SECS))
        });
        let scopes = if record.scopes.is_empty() {
            record
                .scope
                .as_deref()
                .map(|scope| scope.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        } else {
            record.scopes
        };

        Self {
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            expires_at,
            scopes,
            token_type: record.token_type.unwrap_or_else(default_token_type),
            last_refresh: record.last_refresh.unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

impl TokenInfo {
    /// Creates a new token from token endpoint response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| expiry_from(now, secs)),
            scopes,
            token_type: default_token_type(),
            last_refresh: now,
        }
    }

    /// Returns true if the access token is known to be expired.
    ///
    /// Tokens without an expiry are trusted.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at)
    }

    /// Returns true if this token can be refreshed without user interaction.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Applies a refresh response.
    ///
    /// Google usually omits the refresh token on refresh; the existing one is
    /// kept in that case.
    pub fn apply_refresh(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) {
        let now = Utc::now();
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expires_in_secs.map(|secs| expiry_from(now, secs));
        self.last_refresh = now;
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at - Utc::now())
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in_secs) - Duration::seconds(EXPIRY_MARGIN_SECS)
}

/// File-backed token store.
///
/// Holds no state besides its path; the authenticator owns the in-memory
/// credential.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store for the given token file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the persisted token.
    ///
    /// Returns `None` if the file is missing, unreadable or does not parse;
    /// a corrupt file is treated like a missing one.
    pub fn load(&self) -> Option<TokenInfo> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read token file");
                return None;
            }
        };

        match serde_json::from_str::<TokenInfo>(&content) {
            Ok(token) => {
                debug!(path = %self.path.display(), "loaded token");
                Some(token)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "token file is corrupt, ignoring it"
                );
                None
            }
        }
    }

    /// Writes the token, replacing any existing file.
    ///
    /// The parent directory is created if needed.
    pub fn save(&self, token: &TokenInfo) -> CalendarResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CalendarError::token_persist(format!(
                    "failed to create token directory {}: {}",
                    parent.display(),
                    e
                ))
                .with_source(e)
            })?;
        }

        let content = serde_json::to_string_pretty(token).map_err(|e| {
            CalendarError::internal(format!("failed to serialize token: {}", e)).with_source(e)
        })?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).map_err(|e| {
            CalendarError::token_persist(format!("failed to write token file: {}", e))
                .with_source(e)
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            CalendarError::token_persist(format!("failed to replace token file: {}", e))
                .with_source(e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        info!(path = %self.path.display(), "token stored");
        Ok(())
    }

    /// Removes the token file if it exists.
    pub fn clear(&self) -> CalendarResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "token removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CalendarError::token_persist(format!(
                "failed to remove token file: {}",
                e
            ))
            .with_source(e)),
        }
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
