//! Token types for authentication.

use chrono::{DateTime, Utc};
use oauth2::{AccessToken, ClientId, DeviceCode, RefreshToken, Scope, UserCode};
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Fallback device-code lifetime when the provider omits `expires_in`.
const DEFAULT_CHALLENGE_LIFETIME_SECS: u64 = 900;

/// Fallback polling interval when the provider omits `interval` (RFC 8628 §3.2).
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Application registration the device-code grant runs against.
///
/// Immutable once built from configuration.
#[derive(Debug, Clone)]
pub struct Credentials {
    tenant_id: String,
    client_id: ClientId,
    scopes: Vec<Scope>,
}

impl Credentials {
    /// Creates credentials for a tenant and client.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Config`] if the tenant or client identifier is blank.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        scopes: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();

        if tenant_id.trim().is_empty() {
            return Err(GraphError::Config("Tenant ID must not be empty".to_string()));
        }
        if client_id.trim().is_empty() {
            return Err(GraphError::Config("Client ID must not be empty".to_string()));
        }

        Ok(Self {
            tenant_id,
            client_id: ClientId::new(client_id),
            scopes: scopes
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .map(Scope::new)
                .collect(),
        })
    }

    /// Directory tenant (`common`, `organizations`, a GUID or a domain).
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Application (client) ID.
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Requested scopes as the space-separated `scope` form value.
    pub fn scope(&self) -> String {
        self.scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The live access/refresh token pair and its expiry clock.
///
/// Replaced as a whole on every exchange; never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenState {
    /// Bearer token for downstream calls.
    pub access_token: AccessToken,
    /// Token for the `refresh_token` grant (absent without `offline_access`).
    pub refresh_token: Option<RefreshToken>,
    /// Lifetime reported by the provider.
    pub expires_in_secs: u64,
    /// When the pair was issued, in epoch milliseconds.
    pub issued_at_ms: i64,
}

impl TokenState {
    /// Lifetime in milliseconds, saturating on absurd provider values.
    pub fn lifetime_ms(&self) -> i64 {
        i64::try_from(self.expires_in_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    /// Whether the token is stale at `now_ms`.
    ///
    /// Expired only once the elapsed time strictly exceeds the lifetime; there is no
    /// safety margin.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.issued_at_ms) > self.lifetime_ms()
    }

    /// Check if the token can be refreshed.
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Wall-clock expiry, for display.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.issued_at_ms.saturating_add(self.lifetime_ms()))
    }
}

/// Response of the device-code endpoint.
///
/// Produced by the authorization step and consumed by polling. Never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeChallenge {
    /// Code the client presents to the token endpoint.
    pub device_code: DeviceCode,
    /// Code the user types at the verification page.
    #[serde(default)]
    pub user_code: Option<UserCode>,
    /// Page where the user enters the code.
    #[serde(default, alias = "verification_url")]
    pub verification_uri: Option<String>,
    /// Human-readable instructions to show the operator.
    pub message: String,
    /// Seconds until the device code expires.
    #[serde(
        default = "default_challenge_lifetime",
        deserialize_with = "seconds::deserialize"
    )]
    pub expires_in: u64,
    /// Minimum seconds between polls.
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "seconds::deserialize"
    )]
    pub interval: u64,
}

const fn default_challenge_lifetime() -> u64 {
    DEFAULT_CHALLENGE_LIFETIME_SECS
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Providers disagree on whether second counts are JSON numbers or strings.
pub(crate) mod seconds {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
        }
    }
}

/// Hand-driven clock for expiry tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock(std::sync::atomic::AtomicI64);

#[cfg(test)]
impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(now_ms))
    }

    pub fn set(&self, now_ms: i64) {
        self.0.store(now_ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(issued_at_ms: i64, expires_in_secs: u64) -> TokenState {
        TokenState {
            access_token: AccessToken::new("AT1".to_string()),
            refresh_token: Some(RefreshToken::new("RT1".to_string())),
            expires_in_secs,
            issued_at_ms,
        }
    }

    #[test]
    fn token_is_fresh_until_lifetime_strictly_exceeded() {
        let t = token(1_000, 3600);
        assert!(!t.is_expired_at(1_000 + 3_599_000));
        assert!(!t.is_expired_at(1_000 + 3_600_000));
        assert!(t.is_expired_at(1_000 + 3_600_001));
    }

    #[test]
    fn zero_lifetime_expires_after_one_millisecond() {
        let t = token(5_000, 0);
        assert!(!t.is_expired_at(5_000));
        assert!(t.is_expired_at(5_001));
    }

    #[test]
    fn huge_lifetime_does_not_overflow() {
        let t = token(0, u64::MAX);
        assert_eq!(t.lifetime_ms(), i64::MAX);
        assert!(!t.is_expired_at(i64::MAX));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", token(0, 60));
        assert!(!rendered.contains("AT1"));
        assert!(!rendered.contains("RT1"));
    }

    #[test]
    fn credentials_join_scopes_with_spaces() {
        let creds = Credentials::new(
            "common",
            "client-1",
            vec!["offline_access".to_string(), " ".to_string(), "Mail.Read".to_string()],
        )
        .unwrap();
        assert_eq!(creds.scope(), "offline_access Mail.Read");
        assert_eq!(creds.client_id().as_str(), "client-1");
    }

    #[test]
    fn credentials_reject_blank_client() {
        let err = Credentials::new("common", "  ", Vec::new()).unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn challenge_requires_only_device_code_and_message() {
        let challenge: DeviceCodeChallenge = serde_json::from_str(
            r#"{"device_code":"D1","message":"Go to https://x/y and enter ABC123"}"#,
        )
        .unwrap();
        assert_eq!(challenge.device_code.secret(), "D1");
        assert!(challenge.user_code.is_none());
        assert_eq!(challenge.expires_in, DEFAULT_CHALLENGE_LIFETIME_SECS);
        assert_eq!(challenge.interval, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn challenge_accepts_string_and_number_seconds() {
        let challenge: DeviceCodeChallenge = serde_json::from_str(
            r#"{"device_code":"D1","user_code":"ABC123","verification_uri":"https://x/y",
                "message":"m","expires_in":"600","interval":3}"#,
        )
        .unwrap();
        assert_eq!(challenge.expires_in, 600);
        assert_eq!(challenge.interval, 3);
        assert_eq!(challenge.user_code.unwrap().secret(), "ABC123");
    }

    #[test]
    fn challenge_without_message_is_rejected() {
        let parsed = serde_json::from_str::<DeviceCodeChallenge>(r#"{"device_code":"D1"}"#);
        assert!(parsed.is_err());
    }
}
