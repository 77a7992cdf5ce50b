//! OAuth 2.0 authorization code flow for Google APIs.
//!
//! The user opens an authorization URL, grants access, and pastes back either
//! the authorization code or the whole redirect URL. The code is exchanged
//! (with its PKCE verifier) for an access token and a refresh token.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::api::BoxFuture;
use crate::error::{CalendarError, CalendarResult};

use super::config::ClientSecrets;
use super::tokens::TokenInfo;

/// Google OAuth endpoints.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Response from Google's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Converts a fresh grant into a stored token.
    ///
    /// Falls back to the requested scopes when the server does not echo them.
    pub fn into_token_info(self, requested_scopes: &[String]) -> TokenInfo {
        let scopes = match self.scope {
            Some(ref granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(str::to_string).collect()
            }
            _ => requested_scopes.to_vec(),
        };
        let mut token = TokenInfo::new(
            self.access_token,
            self.refresh_token,
            self.expires_in,
            scopes,
        );
        if let Some(token_type) = self.token_type {
            token.token_type = token_type;
        }
        token
    }
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// The token endpoint operations the authenticator needs.
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges an authorization code (and its PKCE verifier) for tokens.
    fn exchange_code<'a>(
        &'a self,
        secrets: &'a ClientSecrets,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, CalendarResult<TokenResponse>>;

    /// Obtains a new access token from a refresh token.
    fn refresh<'a>(
        &'a self,
        secrets: &'a ClientSecrets,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, CalendarResult<TokenResponse>>;
}

/// HTTP client for Google's OAuth token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
    token_url: String,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    pub fn new(timeout: Duration, user_agent: &str) -> CalendarResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                CalendarError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        })
    }

    /// Overrides the token endpoint URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    async fn post_form(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> CalendarResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                CalendarError::authorization(format!("{} request failed: {}", what, e))
                    .with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            CalendarError::authorization(format!("failed to read {} response: {}", what, e))
                .with_source(e)
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|err| match err.error_description {
                    Some(description) => format!("{} ({})", err.error, description),
                    None => err.error,
                })
                .unwrap_or(body);
            return Err(CalendarError::authorization(format!(
                "{} failed ({}): {}",
                what, status, detail
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            CalendarError::authorization(format!("invalid {} response: {}", what, e))
                .with_source(e)
        })
    }
}

impl TokenEndpoint for OAuthClient {
    fn exchange_code<'a>(
        &'a self,
        secrets: &'a ClientSecrets,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, CalendarResult<TokenResponse>> {
        Box::pin(async move {
            let params = [
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("code", code),
                ("code_verifier", verifier),
                ("grant_type", "authorization_code"),
                ("redirect_uri", secrets.redirect_uri.as_str()),
            ];
            let response = self.post_form(&params, "token exchange").await?;
            info!("authorization code exchanged for tokens");
            Ok(response)
        })
    }

    fn refresh<'a>(
        &'a self,
        secrets: &'a ClientSecrets,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, CalendarResult<TokenResponse>> {
        Box::pin(async move {
            let params = [
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ];
            let response = self.post_form(&params, "token refresh").await?;
            info!("access token refreshed");
            Ok(response)
        })
    }
}

/// PKCE flow state and utilities.
///
/// Implements RFC 7636 (Proof Key for Code Exchange).
#[derive(Debug, Clone)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state echoed back in the redirect.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = random_token(16);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    /// Computes the SHA-256 challenge for a code verifier.
    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the Google OAuth authorization URL.
    ///
    /// Requests offline access so that a refresh token is issued.
    pub fn build_auth_url(&self, secrets: &ClientSecrets, scopes: &[String]) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&secrets.client_id),
            urlencoding::encode(&secrets.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }

    /// Extracts the authorization code from what the user pasted.
    ///
    /// Accepts the bare code, or the full redirect URL. For a URL, an `error`
    /// parameter fails the flow and a `state` parameter must match ours.
    pub fn parse_user_input(&self, input: &str) -> CalendarResult<String> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CalendarError::authorization("no authorization code entered"));
        }

        let Ok(url) = Url::parse(input) else {
            return Ok(input.to_string());
        };

        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => {
                    return Err(CalendarError::authorization(format!(
                        "authorization denied: {}",
                        value
                    )));
                }
                _ => {}
            }
        }

        if let Some(state) = state
            && state != self.state
        {
            return Err(CalendarError::authorization(
                "OAuth state mismatch in redirect URL",
            ));
        }

        debug!("extracted authorization code from redirect URL");
        code.ok_or_else(|| {
            CalendarError::authorization("redirect URL does not contain an authorization code")
        })
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
