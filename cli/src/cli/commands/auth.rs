//! Authentication command handlers.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use reqwest::Client;

use crate::auth::{
    open_browser, AuthEndpoints, DeviceCodeChallenge, KeyringTokenStore, TokenManager,
};
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};

/// Builds the token manager for the configured tenant and client.
///
/// The keyring cache is attached unless `auth.cache_tokens` is off or the
/// keyring is unavailable.
pub fn token_manager(config: &GraphConfig) -> Result<Arc<TokenManager>> {
    let credentials = config.credentials()?;
    let endpoints = AuthEndpoints::for_tenant(&config.auth.authority, credentials.tenant_id())?;

    let http = Client::builder()
        .user_agent(format!("graph-cli/{}", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut manager = TokenManager::new(credentials, endpoints, http);

    if config.auth.cache_tokens {
        match KeyringTokenStore::new(manager.credentials()) {
            Ok(store) => manager = manager.with_store(Arc::new(store)),
            Err(e) => tracing::warn!(error = %e, "token cache unavailable"),
        }
    }

    Ok(Arc::new(manager))
}

/// Signs in from the cache, or through the device-code flow.
pub async fn handle_sign_in(
    tokens: &TokenManager,
    no_browser: bool,
    manual_confirm: bool,
) -> Result<()> {
    match tokens.restore_cached().await {
        Ok(true) => {
            tracing::debug!("using cached tokens");
            return Ok(());
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable token cache"),
    }

    let challenge = tokens.start_device_code_flow().await?;

    println!("{}", challenge.message);
    println!();

    if !no_browser {
        if open_browser(&challenge) {
            println!("Browser opened automatically.");
        } else {
            println!("Could not open browser. Please visit the URL manually.");
        }
        println!();
    }

    if manual_confirm {
        confirm_manually(tokens, &challenge, &mut io::stdin().lock()).await?;
    } else {
        println!("Waiting for authorization...");
        tokens.wait_for_authorization(&challenge).await?;
    }

    println!("Signed in.");
    println!();
    Ok(())
}

/// One poll per line read from `input`.
async fn confirm_manually(
    tokens: &TokenManager,
    challenge: &DeviceCodeChallenge,
    input: &mut impl BufRead,
) -> Result<()> {
    loop {
        print!("Press Enter once you have signed in in the browser...");
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(GraphError::NotAuthenticated);
        }

        match tokens.poll_for_tokens(challenge).await {
            Ok(_) => return Ok(()),
            Err(GraphError::AuthorizationPending | GraphError::SlowDown) => {
                println!("Sign-in not completed yet.");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Handle the `graph logout` command.
pub async fn handle_logout(tokens: &TokenManager) -> Result<()> {
    tokens.sign_out().await?;
    println!("Successfully logged out.");
    Ok(())
}
