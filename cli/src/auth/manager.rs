//! Device-code token lifecycle: acquire, poll, cache, refresh on expiry.
//!
//! ```text
//! Unauthenticated -> PendingDeviceConfirmation -> Authenticated
//!        ^                                           |    ^
//!        |                                           v    |
//!        +------------- refresh failed ---------- Refreshing
//! ```
//!
//! All token reads and refreshes go through one async mutex, so concurrent callers
//! never observe an access token paired with a mismatched refresh token and an
//! expired token is refreshed exactly once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::auth::credentials::TokenStore;
use crate::auth::device_flow;
use crate::auth::endpoints::AuthEndpoints;
use crate::auth::tokens::{Clock, Credentials, DeviceCodeChallenge, SystemClock, TokenState};
use crate::error::{GraphError, Result};

/// Added to the polling interval on every `slow_down` (RFC 8628 §3.5).
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Where the manager is in the sign-in state machine.
///
/// There is no `Refreshing` variant: a refresh runs while holding the session
/// lock, so no caller can observe the manager mid-refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// No token; a device-code flow must be started.
    Unauthenticated,
    /// A device code was issued and the user has not finished signing in.
    PendingDeviceConfirmation,
    /// A token pair is held.
    Authenticated,
}

#[derive(Default)]
struct Session {
    tokens: Option<TokenState>,
    pending: bool,
}

/// Owns the credentials, the current token pair and its expiry clock.
///
/// Constructed once and shared (`Arc<TokenManager>`) with every caller that needs a
/// bearer token.
pub struct TokenManager {
    credentials: Credentials,
    endpoints: AuthEndpoints,
    http: Client,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn TokenStore>>,
    session: Mutex<Session>,
}

impl TokenManager {
    /// Create a manager with the system clock and no token cache.
    #[must_use]
    pub fn new(credentials: Credentials, endpoints: AuthEndpoints, http: Client) -> Self {
        Self {
            credentials,
            endpoints,
            http,
            clock: Arc::new(SystemClock),
            store: None,
            session: Mutex::new(Session::default()),
        }
    }

    /// Replace the clock used for issuance and expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persist every acquired token pair to `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Credentials this manager signs in with.
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current position in the sign-in state machine.
    pub async fn status(&self) -> AuthStatus {
        let session = self.session.lock().await;
        if session.tokens.is_some() {
            AuthStatus::Authenticated
        } else if session.pending {
            AuthStatus::PendingDeviceConfirmation
        } else {
            AuthStatus::Unauthenticated
        }
    }

    /// Snapshot of the current token pair.
    pub async fn token_state(&self) -> Option<TokenState> {
        self.session.lock().await.tokens.clone()
    }

    /// The access token currently held, without an expiry check.
    pub async fn current_access_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .tokens
            .as_ref()
            .map(|t| t.access_token.secret().clone())
    }

    /// Installs cached tokens from the store, if any.
    ///
    /// An expired cached token is still installed; the next
    /// [`ensure_valid_token`](Self::ensure_valid_token) refreshes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn restore_cached(&self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let Some(tokens) = store.load()? else {
            return Ok(false);
        };

        tracing::info!("restored cached tokens");
        let mut session = self.session.lock().await;
        session.tokens = Some(tokens);
        session.pending = false;
        Ok(true)
    }

    /// Requests a device code. The challenge's `message` is meant for the operator.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AuthRequestFailed`] if the request fails or the response
    /// lacks `device_code` or `message`.
    pub async fn start_device_code_flow(&self) -> Result<DeviceCodeChallenge> {
        let challenge =
            device_flow::start_device_code_flow(&self.http, &self.endpoints, &self.credentials)
                .await?;

        tracing::info!(
            expires_in = challenge.expires_in,
            interval = challenge.interval,
            "device code issued"
        );
        self.session.lock().await.pending = true;
        Ok(challenge)
    }

    /// Polls the token endpoint once and, on success, makes the result current.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AuthorizationPending`] if the user has not signed in yet,
    /// [`GraphError::SlowDown`] if polled too fast, and
    /// [`GraphError::AuthRequestFailed`] on transport or parse failure.
    pub async fn poll_for_tokens(&self, challenge: &DeviceCodeChallenge) -> Result<TokenState> {
        let result = device_flow::poll_for_tokens(
            &self.http,
            &self.endpoints,
            &self.credentials,
            &challenge.device_code,
        )
        .await;

        let mut session = self.session.lock().await;
        match result {
            Ok(response) => {
                let tokens = response.into_state(self.clock.now_millis(), None);
                tracing::info!(expires_in = tokens.expires_in_secs, "signed in");
                self.persist(&tokens);
                session.tokens = Some(tokens.clone());
                session.pending = false;
                Ok(tokens)
            }
            Err(e) => {
                if !matches!(e, GraphError::AuthorizationPending | GraphError::SlowDown) {
                    session.pending = false;
                }
                Err(e)
            }
        }
    }

    /// Polls at the provider's interval until the user signs in or the code expires.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DeviceAuthorizationExpired`] once the challenge lifetime
    /// has elapsed, or the first non-pending error from the token endpoint.
    pub async fn wait_for_authorization(
        &self,
        challenge: &DeviceCodeChallenge,
    ) -> Result<TokenState> {
        let deadline = Instant::now().checked_add(Duration::from_secs(challenge.expires_in));
        let mut interval = Duration::from_secs(challenge.interval);

        loop {
            tokio::time::sleep(interval).await;

            match self.poll_for_tokens(challenge).await {
                Ok(tokens) => return Ok(tokens),
                Err(GraphError::AuthorizationPending) => {
                    tracing::debug!("authorization pending");
                }
                Err(GraphError::SlowDown) => {
                    interval += SLOW_DOWN_STEP;
                    tracing::debug!(interval_secs = interval.as_secs(), "slowing down");
                }
                Err(e) => return Err(e),
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                self.session.lock().await.pending = false;
                return Err(GraphError::DeviceAuthorizationExpired);
            }
        }
    }

    /// Returns an access token, refreshing first if the current one is stale.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotAuthenticated`] before the first sign-in and
    /// [`GraphError::AuthRequestFailed`] if a needed refresh fails.
    pub async fn ensure_valid_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;

        let expired = session
            .tokens
            .as_ref()
            .ok_or(GraphError::NotAuthenticated)?
            .is_expired_at(self.clock.now_millis());

        if expired {
            tracing::info!("access token expired, refreshing");
            self.refresh_locked(&mut session, None).await?;
        }

        session
            .tokens
            .as_ref()
            .map(|t| t.access_token.secret().clone())
            .ok_or(GraphError::NotAuthenticated)
    }

    /// Exchanges the refresh token for a new pair and makes it current.
    ///
    /// A failure is terminal for the session: the manager returns to
    /// [`AuthStatus::Unauthenticated`] and the cache is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotAuthenticated`] without a session, otherwise
    /// [`GraphError::AuthRequestFailed`].
    pub async fn refresh_tokens(&self) -> Result<TokenState> {
        let mut session = self.session.lock().await;
        self.refresh_locked(&mut session, None).await
    }

    /// Like [`refresh_tokens`](Self::refresh_tokens), forwarding a claims challenge.
    ///
    /// # Errors
    ///
    /// Same as [`refresh_tokens`](Self::refresh_tokens).
    pub async fn refresh_with_claims(&self, claims: &str) -> Result<TokenState> {
        let mut session = self.session.lock().await;
        self.refresh_locked(&mut session, Some(claims)).await
    }

    /// Drops the session and the cached tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be cleared.
    pub async fn sign_out(&self) -> Result<()> {
        {
            let mut session = self.session.lock().await;
            *session = Session::default();
        }
        match &self.store {
            Some(store) => store.delete(),
            None => Ok(()),
        }
    }

    async fn refresh_locked(
        &self,
        session: &mut MutexGuard<'_, Session>,
        claims: Option<&str>,
    ) -> Result<TokenState> {
        let refresh_token = session
            .tokens
            .as_ref()
            .ok_or(GraphError::NotAuthenticated)?
            .refresh_token
            .clone();

        let result = match refresh_token.clone() {
            Some(refresh_token) => {
                device_flow::refresh_tokens(
                    &self.http,
                    &self.endpoints,
                    &self.credentials,
                    &refresh_token,
                    claims,
                )
                .await
            }
            None => Err(GraphError::AuthRequestFailed(
                "No refresh token available. Request the offline_access scope.".to_string(),
            )),
        };

        match result {
            Ok(response) => {
                let tokens = response.into_state(self.clock.now_millis(), refresh_token);
                tracing::info!(expires_in = tokens.expires_in_secs, "tokens refreshed");
                self.persist(&tokens);
                session.tokens = Some(tokens.clone());
                Ok(tokens)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed, session ended");
                session.tokens = None;
                session.pending = false;
                self.forget();
                Err(match e {
                    GraphError::AuthRequestFailed(_) => e,
                    other => GraphError::AuthRequestFailed(other.to_string()),
                })
            }
        }
    }

    fn persist(&self, tokens: &TokenState) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(tokens) {
                tracing::warn!(error = %e, "failed to cache tokens");
            }
        }
    }

    fn forget(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.delete() {
                tracing::warn!(error = %e, "failed to clear cached tokens");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::MockTokenStore;
    use crate::auth::tokens::ManualClock;
    use crate::client::AuthenticatedRequestFactory;
    use oauth2::{AccessToken, RefreshToken};
    use reqwest::Method;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const T0: i64 = 1_700_000_000_000;
    const DEVICE_CODE_PATH: &str = "/tenant/oauth2/v2.0/devicecode";
    const TOKEN_PATH: &str = "/tenant/oauth2/v2.0/token";

    fn manager(server: &MockServer, clock: &Arc<ManualClock>) -> TokenManager {
        let credentials = Credentials::new(
            "tenant",
            "client-1",
            vec!["offline_access".to_string(), "Mail.Read".to_string()],
        )
        .unwrap();
        let endpoints = AuthEndpoints::for_tenant(&server.uri(), "tenant").unwrap();
        TokenManager::new(credentials, endpoints, Client::new()).with_clock(clock.clone())
    }

    #[test]
    fn fresh_manager_has_no_session() {
        let credentials = Credentials::new("tenant", "client-1", Vec::new()).unwrap();
        let endpoints =
            AuthEndpoints::for_tenant("https://login.example.test", "tenant").unwrap();
        let manager = TokenManager::new(credentials, endpoints, Client::new());

        assert_eq!(
            tokio_test::block_on(manager.status()),
            AuthStatus::Unauthenticated
        );
        assert!(tokio_test::block_on(manager.current_access_token()).is_none());
        assert!(matches!(
            tokio_test::block_on(manager.ensure_valid_token()),
            Err(GraphError::NotAuthenticated)
        ));
        assert!(!tokio_test::block_on(manager.restore_cached()).unwrap());
    }

    fn challenge(interval: u64, expires_in: u64) -> DeviceCodeChallenge {
        serde_json::from_value(json!({
            "device_code": "D1",
            "message": "Go to https://x/y and enter ABC123",
            "interval": interval,
            "expires_in": expires_in,
        }))
        .unwrap()
    }

    fn cached(access: &str, issued_at_ms: i64) -> TokenState {
        TokenState {
            access_token: AccessToken::new(access.to_string()),
            refresh_token: Some(RefreshToken::new("RT-cached".to_string())),
            expires_in_secs: 3600,
            issued_at_ms,
        }
    }

    async fn mount_device_grant(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code"))
            .and(body_string_contains("device_code=D1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AT1",
                "refresh_token": "RT1",
                "expires_in": "3600"
            })))
            .mount(server)
            .await;
    }

    async fn sign_in(manager: &TokenManager, server: &MockServer) {
        mount_device_grant(server).await;
        manager.poll_for_tokens(&challenge(0, 900)).await.unwrap();
    }

    #[tokio::test]
    async fn start_device_code_flow_returns_challenge() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        Mock::given(method("POST"))
            .and(path(DEVICE_CODE_PATH))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("scope=offline_access+Mail.Read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "D1",
                "message": "Go to https://x/y and enter ABC123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let challenge = manager.start_device_code_flow().await.unwrap();

        assert_eq!(challenge.device_code.secret(), "D1");
        assert_eq!(challenge.message, "Go to https://x/y and enter ABC123");
        assert_eq!(manager.status().await, AuthStatus::PendingDeviceConfirmation);
    }

    #[tokio::test]
    async fn malformed_device_code_response_is_auth_failure() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        Mock::given(method("POST"))
            .and(path(DEVICE_CODE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user_code": "X" })))
            .mount(&server)
            .await;

        let err = manager.start_device_code_flow().await.unwrap_err();
        assert!(matches!(err, GraphError::AuthRequestFailed(_)));
        assert_eq!(manager.status().await, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn poll_records_issuance_time() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);
        mount_device_grant(&server).await;

        let tokens = manager.poll_for_tokens(&challenge(0, 900)).await.unwrap();

        assert_eq!(tokens.access_token.secret(), "AT1");
        assert_eq!(tokens.refresh_token.unwrap().secret(), "RT1");
        assert_eq!(tokens.expires_in_secs, 3600);
        assert_eq!(tokens.issued_at_ms, T0);
        assert_eq!(manager.status().await, AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn poll_before_user_signs_in_is_pending() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "authorization_pending" })),
            )
            .mount(&server)
            .await;

        let err = manager.poll_for_tokens(&challenge(0, 900)).await.unwrap_err();
        assert!(matches!(err, GraphError::AuthorizationPending));
        assert!(manager.current_access_token().await.is_none());
    }

    #[tokio::test]
    async fn ensure_valid_token_requires_sign_in() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        let err = manager.ensure_valid_token().await.unwrap_err();
        assert!(matches!(err, GraphError::NotAuthenticated));
    }

    #[tokio::test]
    async fn token_refreshed_only_after_lifetime_elapses() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);
        sign_in(&manager, &server).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=RT1"))
            .and(body_string_contains("scope=offline_access+Mail.Read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AT2",
                "refresh_token": "RT2",
                "expires_in": "3600"
            })))
            .expect(1)
            .mount(&server)
            .await;

        clock.set(T0 + 3_599_000);
        assert_eq!(manager.ensure_valid_token().await.unwrap(), "AT1");

        clock.set(T0 + 3_601_000);
        assert_eq!(manager.ensure_valid_token().await.unwrap(), "AT2");

        let state = manager.token_state().await.unwrap();
        assert_eq!(state.refresh_token.unwrap().secret(), "RT2");
        assert_eq!(state.issued_at_ms, T0 + 3_601_000);

        let mut requests =
            AuthenticatedRequestFactory::new("https://graph.example/v1.0/me", "AT1").unwrap();
        requests.update_token(manager.ensure_valid_token().await.unwrap());
        let request = requests.build_request("/messages", Method::GET).unwrap();
        assert_eq!(request.authorization(), Some("Bearer AT2"));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = Arc::new(manager(&server, &clock));
        sign_in(&manager, &server).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AT2",
                "refresh_token": "RT2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        clock.set(T0 + 3_601_000);
        let (a, b) = tokio::join!(manager.ensure_valid_token(), manager.ensure_valid_token());

        assert_eq!(a.unwrap(), "AT2");
        assert_eq!(b.unwrap(), "AT2");
    }

    #[tokio::test]
    async fn rejected_refresh_ends_session() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);
        sign_in(&manager, &server).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked"
            })))
            .mount(&server)
            .await;

        clock.set(T0 + 3_601_000);
        let err = manager.ensure_valid_token().await.unwrap_err();

        assert!(matches!(err, GraphError::AuthRequestFailed(_)));
        assert_eq!(manager.status().await, AuthStatus::Unauthenticated);
        assert!(matches!(
            manager.ensure_valid_token().await,
            Err(GraphError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn wait_for_authorization_polls_until_granted() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "authorization_pending" })),
            )
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        mount_device_grant(&server).await;

        let tokens = manager
            .wait_for_authorization(&challenge(0, 900))
            .await
            .unwrap();

        assert_eq!(tokens.access_token.secret(), "AT1");
        assert_eq!(manager.status().await, AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn wait_for_authorization_backs_off_on_slow_down() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": "slow_down" })),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        mount_device_grant(&server).await;

        tokio::time::pause();
        let started = Instant::now();
        let tokens = manager
            .wait_for_authorization(&challenge(1, 900))
            .await
            .unwrap();

        assert_eq!(tokens.access_token.secret(), "AT1");
        assert_eq!(manager.status().await, AuthStatus::Authenticated);
        // One second before the first poll, then 1 + 5 before the second.
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test]
    async fn wait_for_authorization_stops_when_code_expires() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "authorization_pending" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = manager
            .wait_for_authorization(&challenge(0, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::DeviceAuthorizationExpired));
        assert_eq!(manager.status().await, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn wait_for_authorization_stops_on_denial() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "authorization_declined" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = manager
            .wait_for_authorization(&challenge(0, 900))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::AccessDenied));
    }

    #[tokio::test]
    async fn cached_tokens_skip_device_flow() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0 + 60_000));

        let mut store = MockTokenStore::new();
        store
            .expect_load()
            .times(1)
            .returning(|| Ok(Some(cached("AT-cached", T0))));
        store.expect_save().never();

        let manager = manager(&server, &clock).with_store(Arc::new(store));

        assert!(manager.restore_cached().await.unwrap());
        assert_eq!(manager.status().await, AuthStatus::Authenticated);
        assert_eq!(manager.ensure_valid_token().await.unwrap(), "AT-cached");
    }

    #[tokio::test]
    async fn acquired_tokens_are_cached_and_failed_refresh_clears_cache() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));

        let mut store = MockTokenStore::new();
        store
            .expect_save()
            .withf(|tokens| tokens.access_token.secret() == "AT1")
            .times(1)
            .returning(|_| Ok(()));
        store.expect_delete().times(1).returning(|| Ok(()));

        let manager = manager(&server, &clock).with_store(Arc::new(store));
        sign_in(&manager, &server).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        assert!(manager.refresh_tokens().await.is_err());
    }

    #[tokio::test]
    async fn refresh_forwards_claims() {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::at(T0));
        let manager = manager(&server, &clock);
        sign_in(&manager, &server).await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("claims=%7B%22access_token%22"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AT-claims",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager
            .refresh_with_claims(r#"{"access_token":{"acrs":{"essential":true}}}"#)
            .await
            .unwrap();

        assert_eq!(tokens.access_token.secret(), "AT-claims");
        assert_eq!(tokens.refresh_token.unwrap().secret(), "RT1");
    }
}
