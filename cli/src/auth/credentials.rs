//! Token cache backed by the operating system keyring.
//!
//! - macOS: Keychain
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - Windows: Credential Manager
//!
//! The current [`TokenState`] is stored as JSON, one entry per tenant and client.

use keyring::Entry;

use crate::auth::tokens::{Credentials, TokenState};
use crate::error::{GraphError, Result};

const SERVICE_NAME: &str = "graph-cli";

/// Persistence for the live token pair (enables mocking in tests).
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Loads the cached tokens, `None` if nothing is stored.
    fn load(&self) -> Result<Option<TokenState>>;

    /// Replaces the cached tokens.
    fn save(&self, tokens: &TokenState) -> Result<()>;

    /// Removes the cached tokens. No-op if nothing is stored.
    fn delete(&self) -> Result<()>;
}

/// [`TokenStore`] in the OS keyring.
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    /// Opens the keyring entry for the given tenant and client.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CredentialStorage`] if the keyring entry cannot be created,
    /// which may occur if the keyring service is unavailable or locked.
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let account = format!(
            "{}:{}",
            credentials.tenant_id(),
            credentials.client_id().as_str()
        );
        let entry = Entry::new(SERVICE_NAME, &account)?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<TokenState>> {
        match self.entry.get_password() {
            Ok(json) => {
                let tokens = serde_json::from_str(&json).map_err(|e| {
                    GraphError::CredentialStorage(format!("cached tokens are corrupted: {e}"))
                })?;
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, tokens: &TokenState) -> Result<()> {
        let json = serde_json::to_string(tokens)?;
        self.entry.set_password(&json)?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
