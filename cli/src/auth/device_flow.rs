//! OAuth2 device authorization grant exchanges (RFC 8628) and the refresh grant.
//!
//! Each function here performs exactly one form POST. Token state, expiry and
//! polling policy live in [`TokenManager`](crate::auth::TokenManager).

use oauth2::{AccessToken, DeviceCode, RefreshToken};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::auth::endpoints::AuthEndpoints;
use crate::auth::tokens::{seconds, Credentials, DeviceCodeChallenge, TokenState};
use crate::error::{GraphError, Result};

/// `grant_type` for polling with a device code.
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// `grant_type` for renewing with a refresh token.
pub const REFRESH_TOKEN_GRANT: &str = "refresh_token";

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    #[serde(deserialize_with = "seconds::deserialize")]
    pub expires_in: u64,
}

impl TokenResponse {
    /// Stamps the response with its issuance time.
    ///
    /// Providers may omit a rotated refresh token; the previous one stays valid then.
    pub fn into_state(self, issued_at_ms: i64, previous: Option<RefreshToken>) -> TokenState {
        TokenState {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous),
            expires_in_secs: self.expires_in,
            issued_at_ms,
        }
    }
}

/// OAuth error body (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Requests a device code for the configured client and scopes.
///
/// # Errors
///
/// Returns [`GraphError::AuthRequestFailed`] on transport failure, a provider error,
/// or a body without `device_code` and `message`.
pub async fn start_device_code_flow(
    http: &Client,
    endpoints: &AuthEndpoints,
    credentials: &Credentials,
) -> Result<DeviceCodeChallenge> {
    let scope = credentials.scope();
    let params = [
        ("client_id", credentials.client_id().as_str()),
        ("scope", scope.as_str()),
    ];

    tracing::debug!(url = %endpoints.device_code_url, "requesting device code");

    let response = http
        .post(endpoints.device_code_url.clone())
        .form(&params)
        .send()
        .await
        .map_err(|e| GraphError::AuthRequestFailed(format!("Device code request failed: {e}")))?;

    let body = read_body(response).await?;
    serde_json::from_str(&body)
        .map_err(|e| GraphError::AuthRequestFailed(format!("Malformed device code response: {e}")))
}

/// Polls the token endpoint once with a device code.
///
/// # Errors
///
/// Returns [`GraphError::AuthorizationPending`] while the user has not finished signing
/// in, [`GraphError::SlowDown`] when polling too fast, and
/// [`GraphError::AuthRequestFailed`] for transport or parse failures.
pub async fn poll_for_tokens(
    http: &Client,
    endpoints: &AuthEndpoints,
    credentials: &Credentials,
    device_code: &DeviceCode,
) -> Result<TokenResponse> {
    let params = [
        ("grant_type", DEVICE_CODE_GRANT),
        ("client_id", credentials.client_id().as_str()),
        ("device_code", device_code.secret().as_str()),
    ];

    tracing::debug!(url = %endpoints.token_url, "polling token endpoint");
    request_tokens(http, endpoints, &params).await
}

/// Exchanges a refresh token for a new token pair.
///
/// `claims` is forwarded verbatim when the API issued a claims challenge.
///
/// # Errors
///
/// Returns [`GraphError::AuthRequestFailed`] if the provider rejects the refresh token
/// or the response cannot be parsed.
pub async fn refresh_tokens(
    http: &Client,
    endpoints: &AuthEndpoints,
    credentials: &Credentials,
    refresh_token: &RefreshToken,
    claims: Option<&str>,
) -> Result<TokenResponse> {
    let scope = credentials.scope();
    let mut params = vec![
        ("grant_type", REFRESH_TOKEN_GRANT),
        ("client_id", credentials.client_id().as_str()),
        ("refresh_token", refresh_token.secret().as_str()),
        ("scope", scope.as_str()),
    ];
    if let Some(claims) = claims {
        params.push(("claims", claims));
    }

    tracing::debug!(url = %endpoints.token_url, with_claims = claims.is_some(), "refreshing tokens");
    request_tokens(http, endpoints, &params).await
}

/// Open the verification URI in the default browser.
///
/// Returns `true` if the browser was opened successfully, `false` otherwise.
pub fn open_browser(challenge: &DeviceCodeChallenge) -> bool {
    challenge
        .verification_uri
        .as_deref()
        .is_some_and(|uri| open::that(uri).is_ok())
}

async fn request_tokens(
    http: &Client,
    endpoints: &AuthEndpoints,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(endpoints.token_url.clone())
        .form(params)
        .send()
        .await
        .map_err(|e| GraphError::AuthRequestFailed(format!("Token request failed: {e}")))?;

    let body = read_body(response).await?;
    let tokens: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| GraphError::AuthRequestFailed(format!("Malformed token response: {e}")))?;

    if tokens.access_token.secret().is_empty() {
        return Err(GraphError::AuthRequestFailed(
            "Token response carried an empty access token".to_string(),
        ));
    }

    Ok(tokens)
}

async fn read_body(response: Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GraphError::AuthRequestFailed(format!("Failed to read response: {e}")))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(classify_error(status, &body))
    }
}

fn classify_error(status: StatusCode, body: &str) -> GraphError {
    let Ok(error) = serde_json::from_str::<ErrorResponse>(body) else {
        return GraphError::AuthRequestFailed(format!("Identity provider returned {status}"));
    };

    match error.error.as_str() {
        "authorization_pending" => GraphError::AuthorizationPending,
        "slow_down" => GraphError::SlowDown,
        "expired_token" | "code_expired" => GraphError::DeviceAuthorizationExpired,
        "access_denied" | "authorization_declined" => GraphError::AccessDenied,
        code => {
            tracing::warn!(%status, error = code, "identity provider rejected request");
            GraphError::AuthRequestFailed(match error.error_description {
                Some(description) => format!("{code}: {description}"),
                None => format!("{code} ({status})"),
            })
        }
    }
}
