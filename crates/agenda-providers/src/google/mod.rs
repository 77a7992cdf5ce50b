//! Google Calendar backend.
//!
//! # Authentication flow
//!
//! 1. Client secrets are read from the JSON downloaded from the Google Cloud
//!    Console (`installed` section)
//! 2. A persisted token is used if present, refreshed first when expired
//! 3. Otherwise the user visits the consent URL and pastes back the code
//!    (or the whole redirect URL); the code is exchanged with PKCE
//! 4. The token is written back to the token file
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use agenda_providers::Aggregator;
//! use agenda_providers::google::{Authenticator, GoogleCalendarClient, GoogleConfig};
//!
//! let config = GoogleConfig::new("client_secret.json");
//! let auth = Arc::new(Authenticator::new(config.clone())?);
//! let client = GoogleCalendarClient::new(auth, &config)?;
//!
//! let events = Aggregator::new(Arc::new(client)).all_events(None).await?;
//! ```

mod authenticator;
mod client;
mod config;
mod oauth;
mod prompt;
mod tokens;

pub use authenticator::{AuthPhase, Authenticator};
pub use client::{CALENDAR_API_BASE, GoogleCalendarClient};
pub use config::{ClientSecrets, GoogleConfig, OOB_REDIRECT_URI};
pub use oauth::{OAuthClient, PkceFlow, TokenEndpoint, TokenResponse};
pub use prompt::{CodePrompt, StdinPrompt};
pub use tokens::{TokenInfo, TokenStore};
