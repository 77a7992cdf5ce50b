//! Credential acquisition with single-flight authorization.
//!
//! The [`Authenticator`] owns the in-memory credential. Concurrent callers
//! share one acquisition: at most one user prompt and one code exchange run
//! at a time, and every waiter observes the same outcome.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::Shared;
use tracing::{debug, info, warn};

use super::config::{ClientSecrets, GoogleConfig};
use super::oauth::{OAuthClient, PkceFlow, TokenEndpoint};
use super::prompt::{CodePrompt, StdinPrompt};
use super::tokens::{TokenInfo, TokenStore};
use crate::api::BoxFuture;
use crate::error::{CalendarError, CalendarResult};

/// Observable authorization phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No credential in memory.
    Unauthenticated,
    /// An acquisition is running (loading, refreshing, or waiting on the user).
    Authorizing,
    /// A credential is cached in memory.
    Authenticated,
}

/// What one acquisition produced.
///
/// A persist failure yields both a token (kept in memory) and an error
/// (reported to the callers that waited on this attempt).
#[derive(Debug, Clone)]
struct Attempt {
    token: Option<TokenInfo>,
    error: Option<Arc<CalendarError>>,
}

impl Attempt {
    fn ok(token: TokenInfo) -> Self {
        Self {
            token: Some(token),
            error: None,
        }
    }

    fn failed(error: CalendarError) -> Self {
        Self {
            token: None,
            error: Some(Arc::new(error)),
        }
    }
}

type SharedAttempt = Shared<BoxFuture<'static, Attempt>>;

enum AuthState {
    Unauthenticated,
    Authorizing { id: u64, attempt: SharedAttempt },
    Authenticated(TokenInfo),
}

enum Next {
    Join(u64, SharedAttempt),
    Start(Option<TokenInfo>),
}

/// Where an acquired token came from.
enum Obtained {
    /// Read from disk, nothing to write back.
    Stored(TokenInfo),
    /// Refreshed or exchanged, must be persisted.
    Fresh(TokenInfo),
}

struct Inner {
    config: GoogleConfig,
    store: TokenStore,
    endpoint: Arc<dyn TokenEndpoint>,
    prompt: Arc<dyn CodePrompt>,
    force_refresh: AtomicBool,
}

/// Produces access tokens for the calendar client.
pub struct Authenticator {
    inner: Arc<Inner>,
    state: Mutex<AuthState>,
    next_attempt: AtomicU64,
}

impl Authenticator {
    /// Creates an authenticator talking to Google's token endpoint and
    /// prompting on the terminal.
    pub fn new(config: GoogleConfig) -> CalendarResult<Self> {
        config.validate()?;
        let endpoint = OAuthClient::new(config.timeout, &config.user_agent)?;
        Ok(Self::with_parts(
            config,
            Arc::new(endpoint),
            Arc::new(StdinPrompt::new()),
        ))
    }

    /// Creates an authenticator from explicit collaborators.
    pub fn with_parts(
        config: GoogleConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        prompt: Arc<dyn CodePrompt>,
    ) -> Self {
        let store = TokenStore::new(&config.token_path);
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                endpoint,
                prompt,
                force_refresh: AtomicBool::new(false),
            }),
            state: Mutex::new(AuthState::Unauthenticated),
            next_attempt: AtomicU64::new(0),
        }
    }

    /// Returns the token store backing this authenticator.
    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Returns the current phase.
    pub fn phase(&self) -> AuthPhase {
        match &*self.lock_state() {
            AuthState::Unauthenticated => AuthPhase::Unauthenticated,
            AuthState::Authorizing { .. } => AuthPhase::Authorizing,
            AuthState::Authenticated(_) => AuthPhase::Authenticated,
        }
    }

    /// Returns a usable credential.
    ///
    /// A cached, unexpired credential is returned without I/O. Otherwise the
    /// caller joins the in-flight acquisition or starts one: client secrets
    /// are loaded, then the stored token is used (refreshed first if it has
    /// expired), and only when no usable token exists is the user prompted.
    pub async fn credential(&self) -> CalendarResult<TokenInfo> {
        let (id, attempt) = {
            let mut state = self.lock_state();
            let next = match &*state {
                AuthState::Authenticated(token)
                    if !token.is_expired() && !self.inner.force_refresh.load(Ordering::SeqCst) =>
                {
                    return Ok(token.clone());
                }
                AuthState::Authenticated(token) => Next::Start(Some(token.clone())),
                AuthState::Authorizing { id, attempt } => Next::Join(*id, attempt.clone()),
                AuthState::Unauthenticated => Next::Start(None),
            };

            match next {
                Next::Join(id, attempt) => {
                    debug!("joining in-flight authorization");
                    (id, attempt)
                }
                Next::Start(cached) => {
                    let id = self.next_attempt.fetch_add(1, Ordering::SeqCst);
                    let attempt = run_attempt(Arc::clone(&self.inner), cached)
                        .boxed()
                        .shared();
                    *state = AuthState::Authorizing {
                        id,
                        attempt: attempt.clone(),
                    };
                    (id, attempt)
                }
            }
        };

        let outcome = attempt.await;

        {
            let mut state = self.lock_state();
            if matches!(&*state, AuthState::Authorizing { id: current, .. } if *current == id) {
                *state = match &outcome.token {
                    Some(token) => AuthState::Authenticated(token.clone()),
                    None => AuthState::Unauthenticated,
                };
            }
        }

        match outcome {
            Attempt {
                error: Some(error), ..
            } => Err(error.detached()),
            Attempt {
                token: Some(token), ..
            } => Ok(token),
            Attempt { .. } => Err(CalendarError::internal(
                "authorization finished without a token",
            )),
        }
    }

    /// Drops the cached credential; the next acquisition refreshes the
    /// stored token even if it has not expired yet.
    ///
    /// Called after the API rejects the current token. While an acquisition
    /// is running this is a no-op: the token it yields is already new.
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        if matches!(&*state, AuthState::Authenticated(_)) {
            self.inner.force_refresh.store(true, Ordering::SeqCst);
            *state = AuthState::Unauthenticated;
            info!("cached credential invalidated");
        } else {
            debug!("no cached credential to invalidate");
        }
    }

    /// Drops the cached credential and deletes the persisted token, so the
    /// next acquisition prompts the user.
    pub fn forget(&self) -> CalendarResult<()> {
        *self.lock_state() = AuthState::Unauthenticated;
        self.inner.force_refresh.store(false, Ordering::SeqCst);
        self.inner.store.clear()
    }

    fn lock_state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("token_path", &self.inner.store.path())
            .field("phase", &self.phase())
            .finish()
    }
}

async fn run_attempt(inner: Arc<Inner>, cached: Option<TokenInfo>) -> Attempt {
    match obtain(&inner, cached).await {
        Ok(Obtained::Stored(token)) => Attempt::ok(token),
        Ok(Obtained::Fresh(token)) => match inner.store.save(&token) {
            Ok(()) => Attempt::ok(token),
            Err(e) => {
                warn!(error = %e, "token obtained but could not be stored");
                Attempt {
                    token: Some(token),
                    error: Some(Arc::new(e)),
                }
            }
        },
        Err(e) => {
            warn!(error = %e, "authorization failed");
            Attempt::failed(e)
        }
    }
}

async fn obtain(inner: &Inner, cached: Option<TokenInfo>) -> CalendarResult<Obtained> {
    let secrets = ClientSecrets::from_file(&inner.config.client_secret_path)?;
    let force_refresh = inner.force_refresh.swap(false, Ordering::SeqCst);

    if let Some(token) = cached.or_else(|| inner.store.load()) {
        if !force_refresh && !token.is_expired() {
            debug!("using stored token");
            return Ok(Obtained::Stored(token));
        }

        match refresh(inner, &secrets, token).await {
            Some(token) => return Ok(Obtained::Fresh(token)),
            None => info!("stored token is not usable, authorization required"),
        }
    }

    authorize_interactively(inner, &secrets)
        .await
        .map(Obtained::Fresh)
}

/// Refreshes `token`, returning `None` when it has no refresh token or the
/// refresh was rejected.
async fn refresh(inner: &Inner, secrets: &ClientSecrets, mut token: TokenInfo) -> Option<TokenInfo> {
    let refresh_token = token.refresh_token.clone()?;

    debug!("refreshing access token");
    match inner.endpoint.refresh(secrets, &refresh_token).await {
        Ok(response) => {
            token.apply_refresh(
                response.access_token,
                response.refresh_token,
                response.expires_in,
            );
            Some(token)
        }
        Err(e) => {
            warn!(error = %e, "token refresh failed");
            None
        }
    }
}

async fn authorize_interactively(
    inner: &Inner,
    secrets: &ClientSecrets,
) -> CalendarResult<TokenInfo> {
    let flow = PkceFlow::new();
    let auth_url = flow.build_auth_url(secrets, &inner.config.scopes);

    info!("starting interactive authorization");
    let input = inner.prompt.ask(&auth_url).await?;
    let code = flow.parse_user_input(&input)?;

    let response = inner
        .endpoint
        .exchange_code(secrets, &code, &flow.verifier)
        .await?;

    Ok(response.into_token_info(&inner.config.scopes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalendarErrorCode;
    use crate::google::oauth::TokenResponse;
    use chrono::{Duration, Utc};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    const SECRETS_JSON: &str = r#"{
        "installed": {
            "client_id": "test-client",
            "client_secret": "test-secret",
            "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob"]
        }
    }"#;

    #[derive(Default)]
    struct FakeEndpoint {
        exchanges: AtomicUsize,
        refreshes: AtomicUsize,
        fail_exchange: bool,
        fail_refresh: bool,
    }

    impl TokenEndpoint for FakeEndpoint {
        fn exchange_code<'a>(
            &'a self,
            _secrets: &'a ClientSecrets,
            code: &'a str,
            _verifier: &'a str,
        ) -> BoxFuture<'a, CalendarResult<TokenResponse>> {
            Box::pin(async move {
                self.exchanges.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                if self.fail_exchange {
                    return Err(CalendarError::authorization("invalid_grant: bad code"));
                }
                Ok(response(&format!("access-for-{}", code), Some("refresh-1")))
            })
        }

        fn refresh<'a>(
            &'a self,
            _secrets: &'a ClientSecrets,
            _refresh_token: &'a str,
        ) -> BoxFuture<'a, CalendarResult<TokenResponse>> {
            Box::pin(async move {
                self.refreshes.fetch_add(1, Ordering::SeqCst);
                if self.fail_refresh {
                    return Err(CalendarError::authorization("invalid_grant: revoked"));
                }
                Ok(response("refreshed-access", None))
            })
        }
    }

    fn response(access: &str, refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in: Some(3600),
            scope: None,
            token_type: Some("Bearer".to_string()),
        }
    }

    #[derive(Default)]
    struct FakePrompt {
        asks: AtomicUsize,
        last_url: Mutex<Option<String>>,
    }

    impl CodePrompt for FakePrompt {
        fn ask<'a>(&'a self, auth_url: &'a str) -> BoxFuture<'a, CalendarResult<String>> {
            Box::pin(async move {
                self.asks.fetch_add(1, Ordering::SeqCst);
                *self.last_url.lock().unwrap() = Some(auth_url.to_string());
                tokio::task::yield_now().await;
                Ok("pasted-code\n".to_string())
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: GoogleConfig,
        endpoint: Arc<FakeEndpoint>,
        prompt: Arc<FakePrompt>,
    }

    impl Fixture {
        fn new(endpoint: FakeEndpoint) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let secrets = dir.path().join("client_secret.json");
            std::fs::write(&secrets, SECRETS_JSON).unwrap();
            let config = GoogleConfig::new(&secrets)
                .with_token_path(dir.path().join(".credentials").join("token.json"));
            Self {
                _dir: dir,
                config,
                endpoint: Arc::new(endpoint),
                prompt: Arc::new(FakePrompt::default()),
            }
        }

        fn authenticator(&self) -> Authenticator {
            Authenticator::with_parts(
                self.config.clone(),
                Arc::clone(&self.endpoint) as Arc<dyn TokenEndpoint>,
                Arc::clone(&self.prompt) as Arc<dyn CodePrompt>,
            )
        }

        fn token_path(&self) -> &Path {
            &self.config.token_path
        }

        fn asks(&self) -> usize {
            self.prompt.asks.load(Ordering::SeqCst)
        }

        fn exchanges(&self) -> usize {
            self.endpoint.exchanges.load(Ordering::SeqCst)
        }

        fn refreshes(&self) -> usize {
            self.endpoint.refreshes.load(Ordering::SeqCst)
        }
    }

    fn stored_token(access: &str, expires_in: i64) -> TokenInfo {
        TokenInfo::new(
            access,
            Some("stored-refresh".to_string()),
            Some(expires_in),
            vec![GoogleConfig::SCOPE_CALENDAR.to_string()],
        )
    }

    #[tokio::test]
    async fn malformed_secrets_fail_without_prompt() {
        let fixture = Fixture::new(FakeEndpoint::default());
        std::fs::write(&fixture.config.client_secret_path, "{ broken").unwrap();
        let auth = fixture.authenticator();

        let err = auth.credential().await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::ConfigurationError);
        assert_eq!(fixture.asks(), 0);
        assert_eq!(fixture.exchanges(), 0);
        assert_eq!(auth.phase(), AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn missing_token_prompts_and_persists() {
        let fixture = Fixture::new(FakeEndpoint::default());
        let auth = fixture.authenticator();
        assert_eq!(auth.phase(), AuthPhase::Unauthenticated);

        let token = auth.credential().await.unwrap();
        assert_eq!(token.access_token, "access-for-pasted-code");
        assert_eq!(fixture.asks(), 1);
        assert_eq!(fixture.exchanges(), 1);
        assert_eq!(auth.phase(), AuthPhase::Authenticated);

        let url = fixture.prompt.last_url.lock().unwrap().clone().unwrap();
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("client_id=test-client"));

        let persisted = TokenStore::new(fixture.token_path()).load().unwrap();
        assert_eq!(persisted, token);
    }

    #[tokio::test]
    async fn cached_credential_skips_io() {
        let fixture = Fixture::new(FakeEndpoint::default());
        let auth = fixture.authenticator();

        let first = auth.credential().await.unwrap();
        // Secrets gone: a second acquisition would fail
        std::fs::remove_file(&fixture.config.client_secret_path).unwrap();
        let second = auth.credential().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fixture.asks(), 1);
        assert_eq!(fixture.exchanges(), 1);
    }

    #[tokio::test]
    async fn corrupt_token_file_prompts() {
        let fixture = Fixture::new(FakeEndpoint::default());
        std::fs::create_dir_all(fixture.token_path().parent().unwrap()).unwrap();
        std::fs::write(fixture.token_path(), "not json").unwrap();

        let auth = fixture.authenticator();
        auth.credential().await.unwrap();

        assert_eq!(fixture.asks(), 1);
        assert!(TokenStore::new(fixture.token_path()).load().is_some());
    }

    #[tokio::test]
    async fn stored_token_is_used_without_prompt() {
        let fixture = Fixture::new(FakeEndpoint::default());
        let stored = stored_token("stored-access", 3600);
        TokenStore::new(fixture.token_path()).save(&stored).unwrap();

        let auth = fixture.authenticator();
        let token = auth.credential().await.unwrap();

        assert_eq!(token, stored);
        assert_eq!(fixture.asks(), 0);
        assert_eq!(fixture.exchanges(), 0);
        assert_eq!(fixture.refreshes(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let fixture = Fixture::new(FakeEndpoint::default());
        let mut stored = stored_token("old-access", 3600);
        stored.expires_at = Some(Utc::now() - Duration::minutes(5));
        TokenStore::new(fixture.token_path()).save(&stored).unwrap();

        let auth = fixture.authenticator();
        let token = auth.credential().await.unwrap();

        assert_eq!(token.access_token, "refreshed-access");
        assert_eq!(token.refresh_token.as_deref(), Some("stored-refresh"));
        assert_eq!(fixture.refreshes(), 1);
        assert_eq!(fixture.asks(), 0);

        let persisted = TokenStore::new(fixture.token_path()).load().unwrap();
        assert_eq!(persisted.access_token, "refreshed-access");
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_prompt() {
        let fixture = Fixture::new(FakeEndpoint {
            fail_refresh: true,
            ..Default::default()
        });
        let mut stored = stored_token("old-access", 3600);
        stored.expires_at = Some(Utc::now() - Duration::minutes(5));
        TokenStore::new(fixture.token_path()).save(&stored).unwrap();

        let auth = fixture.authenticator();
        let token = auth.credential().await.unwrap();

        assert_eq!(token.access_token, "access-for-pasted-code");
        assert_eq!(fixture.refreshes(), 1);
        assert_eq!(fixture.asks(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_prompt() {
        let fixture = Fixture::new(FakeEndpoint::default());
        let auth = fixture.authenticator();

        let (a, b, c) = tokio::join!(auth.credential(), auth.credential(), auth.credential());

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
        assert_eq!(fixture.asks(), 1);
        assert_eq!(fixture.exchanges(), 1);
    }

    #[tokio::test]
    async fn exchange_failure_reaches_every_waiter() {
        let fixture = Fixture::new(FakeEndpoint {
            fail_exchange: true,
            ..Default::default()
        });
        let auth = fixture.authenticator();

        let (a, b) = tokio::join!(auth.credential(), auth.credential());

        assert_eq!(a.unwrap_err().code(), CalendarErrorCode::AuthorizationFailed);
        assert_eq!(b.unwrap_err().code(), CalendarErrorCode::AuthorizationFailed);
        assert_eq!(fixture.asks(), 1);
        assert_eq!(auth.phase(), AuthPhase::Unauthenticated);
        assert!(!fixture.token_path().exists());

        // A later call starts a fresh attempt
        assert!(auth.credential().await.is_err());
        assert_eq!(fixture.asks(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let fixture = Fixture::new(FakeEndpoint::default());
        TokenStore::new(fixture.token_path())
            .save(&stored_token("stored-access", 3600))
            .unwrap();
        let auth = fixture.authenticator();

        auth.credential().await.unwrap();
        auth.invalidate();
        assert_eq!(auth.phase(), AuthPhase::Unauthenticated);

        let token = auth.credential().await.unwrap();
        assert_eq!(token.access_token, "refreshed-access");
        assert_eq!(fixture.refreshes(), 1);
        assert_eq!(fixture.asks(), 0);
    }

    /// Blocks inside `ask` until released.
    #[derive(Default)]
    struct GatedPrompt {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    impl CodePrompt for GatedPrompt {
        fn ask<'a>(&'a self, _auth_url: &'a str) -> BoxFuture<'a, CalendarResult<String>> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                Ok("pasted-code".to_string())
            })
        }
    }

    #[tokio::test]
    async fn invalidate_during_authorization_keeps_new_token() {
        let fixture = Fixture::new(FakeEndpoint::default());
        let prompt = Arc::new(GatedPrompt::default());
        let auth = Authenticator::with_parts(
            fixture.config.clone(),
            Arc::clone(&fixture.endpoint) as Arc<dyn TokenEndpoint>,
            Arc::clone(&prompt) as Arc<dyn CodePrompt>,
        );

        let interrupt = async {
            prompt.entered.notified().await;
            assert_eq!(auth.phase(), AuthPhase::Authorizing);
            auth.invalidate();
            prompt.release.notify_one();
        };
        let (token, ()) = tokio::join!(auth.credential(), interrupt);
        let token = token.unwrap();
        assert_eq!(auth.phase(), AuthPhase::Authenticated);

        let again = auth.credential().await.unwrap();
        assert_eq!(again, token);
        assert_eq!(fixture.refreshes(), 0);
        assert_eq!(fixture.exchanges(), 1);
    }

    #[tokio::test]
    async fn persist_failure_keeps_credential_in_memory() {
        let mut fixture = Fixture::new(FakeEndpoint::default());
        let blocker = fixture._dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        fixture.config.token_path = blocker.join("token.json");
        let auth = fixture.authenticator();

        let err = auth.credential().await.unwrap_err();
        assert_eq!(err.code(), CalendarErrorCode::TokenPersist);
        assert_eq!(auth.phase(), AuthPhase::Authenticated);

        let token = auth.credential().await.unwrap();
        assert_eq!(token.access_token, "access-for-pasted-code");
        assert_eq!(fixture.asks(), 1);
    }

    #[tokio::test]
    async fn forget_removes_persisted_token() {
        let fixture = Fixture::new(FakeEndpoint::default());
        let auth = fixture.authenticator();

        auth.credential().await.unwrap();
        assert!(fixture.token_path().exists());

        auth.forget().unwrap();
        assert!(!fixture.token_path().exists());
        assert_eq!(auth.phase(), AuthPhase::Unauthenticated);

        auth.credential().await.unwrap();
        assert_eq!(fixture.asks(), 2);
    }
}
