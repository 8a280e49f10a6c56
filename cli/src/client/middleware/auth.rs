//! Authentication middleware for injecting Bearer tokens.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{Extensions, HeaderMap, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

use crate::auth::TokenManager;

/// Request extension marking a re-send after a claims challenge.
///
/// Holds the decoded claims the token was refreshed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsChallenge(pub String);

/// Middleware that injects the Bearer token into requests.
///
/// Never adds a second `Authorization` header. A request carrying a
/// [`ClaimsChallenge`] extension gets its existing header replaced.
pub struct AuthMiddleware {
    tokens: Arc<TokenManager>,
}

impl AuthMiddleware {
    /// Create a new authentication middleware.
    #[must_use]
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let claims_challenge = extensions.get::<ClaimsChallenge>().is_some();
        let token = self.tokens.current_access_token().await;

        apply_bearer(req.headers_mut(), token.as_deref(), claims_challenge);

        next.run(req, extensions).await
    }
}

/// Adds `Authorization: Bearer <token>` unless already present.
///
/// With `claims_challenge` set, any existing header is removed first. An absent or
/// empty token leaves the request without the header.
pub fn apply_bearer(headers: &mut HeaderMap, token: Option<&str>, claims_challenge: bool) {
    if claims_challenge && headers.remove(AUTHORIZATION).is_some() {
        tracing::debug!("dropped stale Authorization header for claims challenge");
    }

    if headers.contains_key(AUTHORIZATION) {
        return;
    }

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return;
    };

    if let Ok(mut value) = HeaderValue::from_str(&format!("Bearer {token}")) {
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
}
