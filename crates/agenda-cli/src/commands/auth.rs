//! `agenda auth`.

use agenda_providers::google::Authenticator;
use tracing::info;

use crate::error::CliResult;

/// Makes sure a usable credential exists, prompting the user if needed.
///
/// With `force`, the stored token is deleted first so the consent flow runs
/// again.
pub async fn run(auth: &Authenticator, force: bool) -> CliResult<String> {
    if force {
        auth.forget()?;
        info!("stored token discarded");
    }

    let token = auth.credential().await?;

    let mut lines = vec![format!(
        "Authorized. Token stored in {}",
        auth.store().path().display()
    )];
    if let Some(remaining) = token.time_until_expiry() {
        lines.push(format!(
            "Access token valid for {} more minutes.",
            remaining.num_minutes().max(0)
        ));
    }
    if !token.can_refresh() {
        lines.push("No refresh token was granted; you will be asked again when it expires.".to_string());
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agenda_providers::google::{
        ClientSecrets, CodePrompt, GoogleConfig, TokenEndpoint, TokenInfo, TokenResponse,
        TokenStore,
    };
    use agenda_providers::{BoxFuture, CalendarError, CalendarResult};

    struct StaticEndpoint;

    impl TokenEndpoint for StaticEndpoint {
        fn exchange_code<'a>(
            &'a self,
            _secrets: &'a ClientSecrets,
            _code: &'a str,
            _verifier: &'a str,
        ) -> BoxFuture<'a, CalendarResult<TokenResponse>> {
            Box::pin(async {
                Ok(TokenResponse {
                    access_token: "fresh".to_string(),
                    refresh_token: Some("refresh".to_string()),
                    expires_in: Some(3600),
                    scope: None,
                    token_type: None,
                })
            })
        }

        fn refresh<'a>(
            &'a self,
            _secrets: &'a ClientSecrets,
            _refresh_token: &'a str,
        ) -> BoxFuture<'a, CalendarResult<TokenResponse>> {
            Box::pin(async { Err(CalendarError::authorization("not used")) })
        }
    }

    struct PastedCode;

    impl CodePrompt for PastedCode {
        fn ask<'a>(&'a self, _auth_url: &'a str) -> BoxFuture<'a, CalendarResult<String>> {
            Box::pin(async { Ok("4/0Ab-code".to_string()) })
        }
    }

    fn authenticator(dir: &std::path::Path) -> Authenticator {
        let secrets = dir.join("client_secret.json");
        std::fs::write(
            &secrets,
            r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#,
        )
        .unwrap();
        let config = GoogleConfig::new(secrets).with_token_path(dir.join("token.json"));
        Authenticator::with_parts(config, Arc::new(StaticEndpoint), Arc::new(PastedCode))
    }

    #[tokio::test]
    async fn force_replaces_stored_token() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));
        store
            .save(&TokenInfo::new("stale", None, None, vec![]))
            .unwrap();

        let auth = authenticator(tmp.path());
        let output = run(&auth, true).await.unwrap();

        assert!(output.starts_with("Authorized."));
        assert_eq!(store.load().unwrap().access_token, "fresh");
    }

    #[tokio::test]
    async fn existing_token_is_kept_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));
        store
            .save(&TokenInfo::new("kept", None, None, vec![]))
            .unwrap();

        let auth = authenticator(tmp.path());
        let output = run(&auth, false).await.unwrap();

        assert!(output.contains("No refresh token"));
        assert_eq!(store.load().unwrap().access_token, "kept");
    }
}
