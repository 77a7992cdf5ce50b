//! Error types for authentication and calendar operations.
//!
//! A single [`CalendarError`] is used across the crate; its
//! [`CalendarErrorCode`] tells callers which stage failed.

use std::fmt;
use thiserror::Error;

/// The category of a calendar error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarErrorCode {
    /// The client secrets file is missing or malformed. Fatal at startup.
    ConfigurationError,
    /// The authorization code or refresh token was rejected, or the token
    /// endpoint could not be reached.
    AuthorizationFailed,
    /// The token could not be written to disk.
    TokenPersist,
    /// A calendar API call failed (non-2xx status or transport error).
    RemoteApi,
    /// The server answered with a body we could not decode.
    InvalidResponse,
    /// Unexpected internal state.
    InternalError,
}

impl CalendarErrorCode {
    /// Returns a stable, machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::AuthorizationFailed => "authorization_failed",
            Self::TokenPersist => "token_persist_error",
            Self::RemoteApi => "remote_api_error",
            Self::InvalidResponse => "invalid_response",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for CalendarErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while authenticating or talking to the calendar API.
#[derive(Debug, Error)]
pub struct CalendarError {
    code: CalendarErrorCode,
    message: String,
    /// HTTP status of the failed remote call, when there was one.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CalendarError {
    /// Creates a new error with the given code and message.
    pub fn new(code: CalendarErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a configuration error (client secrets unreadable or invalid).
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::ConfigurationError, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::AuthorizationFailed, message)
    }

    /// Creates a token persistence error.
    pub fn token_persist(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::TokenPersist, message)
    }

    /// Creates a remote API error carrying the HTTP status.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(CalendarErrorCode::RemoteApi, message);
        err.status = Some(status);
        err
    }

    /// Creates a remote API error for a call that never got a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::RemoteApi, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::InvalidResponse, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CalendarErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> CalendarErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status of the failed call, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if the server rejected the credential (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    /// Copies code, message and status into a new error, dropping the source.
    ///
    /// Used to hand one failure to several waiters.
    pub fn detached(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            status: self.status,
            source: None,
        }
    }
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.code)?;
        if let Some(status) = self.status {
            write!(f, "({}) ", status)?;
        }
        write!(f, "{}", self.message)
    }
}

/// A specialized Result type for calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
