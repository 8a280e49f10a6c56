//! Application configuration settings.

use serde::{Deserialize, Serialize};

use crate::auth::endpoints::DEFAULT_AUTHORITY;
use crate::auth::Credentials;
use crate::error::{GraphError, Result};

/// Main configuration for graph-cli.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Authentication settings.
    pub auth: AuthConfig,
    /// API client settings.
    pub api: ApiConfig,
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Directory tenant: a GUID, a domain, `common`, `organizations` or `consumers`.
    pub tenant_id: String,
    /// Application (client) ID of the app registration.
    pub client_id: Option<String>,
    /// Delegated permissions requested at sign-in.
    pub scopes: Vec<String>,
    /// Identity platform host.
    pub authority: String,
    /// Keep tokens in the OS keyring between runs.
    pub cache_tokens: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tenant_id: "common".to_string(),
            client_id: None,
            scopes: [
                "offline_access",
                "User.Read",
                "Mail.Read",
                "Mail.Send",
                "Calendars.Read",
                "People.Read",
                "Contacts.Read",
                "Tasks.ReadWrite",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            authority: DEFAULT_AUTHORITY.to_string(),
            cache_tokens: true,
        }
    }
}

/// API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Graph base URL every request path is appended to.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Display name of the to-do list new tasks go to.
    pub todo_list: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0/me".to_string(),
            timeout_secs: 30,
            todo_list: "Tasks".to_string(),
        }
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const TENANT_ID: &str = "GRAPH_TENANT_ID";
    pub const CLIENT_ID: &str = "GRAPH_CLIENT_ID";
    pub const SCOPES: &str = "GRAPH_SCOPES";
    pub const AUTHORITY: &str = "GRAPH_AUTHORITY";
    pub const API_URL: &str = "GRAPH_API_URL";
    pub const LOG_LEVEL: &str = "GRAPH_LOG";
}

impl GraphConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`. Blank values are ignored.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(tenant) = var(env::TENANT_ID) {
            self.auth.tenant_id = tenant;
        }
        if let Some(client) = var(env::CLIENT_ID) {
            self.auth.client_id = Some(client);
        }
        if let Some(scopes) = var(env::SCOPES) {
            self.auth.scopes = scopes
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(authority) = var(env::AUTHORITY) {
            self.auth.authority = authority;
        }
        if let Some(url) = var(env::API_URL) {
            self.api.base_url = url;
        }

        self
    }

    /// Build the immutable sign-in identity from the `[auth]` table.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Config`] if no client ID is configured.
    pub fn credentials(&self) -> Result<Credentials> {
        let client_id = self
            .auth
            .client_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                GraphError::Config(format!(
                    "auth.client_id is not set. Add it to the config file or set {}",
                    env::CLIENT_ID
                ))
            })?;

        Credentials::new(&self.auth.tenant_id, client_id, self.auth.scopes.clone())
    }
}
