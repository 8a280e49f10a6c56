//! Identity platform endpoint resolution.

use url::Url;

use crate::error::{GraphError, Result};

/// Default identity authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// OAuth2 endpoints for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    /// `.../oauth2/v2.0/devicecode`
    pub device_code_url: Url,
    /// `.../oauth2/v2.0/token`
    pub token_url: Url,
}

impl AuthEndpoints {
    /// Resolves the v2.0 endpoints for `tenant_id` under `authority`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Config`] if the authority is not an absolute http(s) URL.
    pub fn for_tenant(authority: &str, tenant_id: &str) -> Result<Self> {
        let base = Url::parse(&format!(
            "{}/{}/oauth2/v2.0/",
            authority.trim_end_matches('/'),
            tenant_id.trim_matches('/')
        ))
        .map_err(|e| GraphError::Config(format!("Invalid authority URL '{authority}': {e}")))?;

        if !matches!(base.scheme(), "https" | "http") {
            return Err(GraphError::Config(format!(
                "Authority must be an http(s) URL, got '{authority}'"
            )));
        }

        let endpoint = |name: &str| {
            base.join(name).map_err(|e| {
                GraphError::Config(format!("Invalid authority URL '{authority}': {e}"))
            })
        };

        Ok(Self {
            device_code_url: endpoint("devicecode")?,
            token_url: endpoint("token")?,
        })
    }
}
