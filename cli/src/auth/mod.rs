//! Authentication module for graph-cli.
//!
//! OAuth2 device-code sign-in against the Microsoft identity platform, silent
//! refresh on expiry, and an OS keyring token cache.

pub mod credentials;
pub mod device_flow;
pub mod endpoints;
pub mod manager;
pub mod tokens;

pub use credentials::{KeyringTokenStore, TokenStore};
pub use device_flow::open_browser;
pub use endpoints::AuthEndpoints;
pub use manager::{AuthStatus, TokenManager};
pub use tokens::{Credentials, DeviceCodeChallenge, TokenState};
