//! Error types and result aliases for graph-cli.
//!
//! Errors fall into three groups:
//! - OAuth exchange failures (device-code flow, refresh)
//! - Caller misuse (`InvalidArgument`)
//! - Downstream API and environment failures (network, config, keyring)

use thiserror::Error;

/// Main error type for graph-cli operations.
///
/// Each variant includes a user-facing message with a recovery hint where one exists.
/// Use [`requires_reauth`](Self::requires_reauth) and [`is_retriable`](Self::is_retriable)
/// to decide how to react.
#[derive(Error, Debug)]
pub enum GraphError {
    /// No token has been acquired yet, or the last refresh failed.
    #[error("Not signed in. Restart 'graph' to sign in with a device code.")]
    NotAuthenticated,

    /// A device-code, token or refresh exchange failed at the transport or parse level,
    /// or the provider rejected it.
    #[error("Authentication request failed: {0}")]
    AuthRequestFailed(String),

    /// The user has not completed the browser-side step yet.
    #[error("Authorization pending. Complete the sign-in in your browser, then try again.")]
    AuthorizationPending,

    /// The provider asked the client to poll less frequently.
    #[error("Polling too frequently. Slow down.")]
    SlowDown,

    /// Device code expired before the user completed authentication.
    #[error("Device code expired. Restart 'graph' and complete the sign-in within the time limit.")]
    DeviceAuthorizationExpired,

    /// User declined the authorization request.
    #[error("Authorization was denied. If this was unintentional, restart 'graph' to try again.")]
    AccessDenied,

    /// Malformed caller input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// API returned a non-success status code.
    #[error("API request failed ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error body returned by the API.
        message: String,
    },

    /// API returned 401 Unauthorized.
    #[error("API server returned unauthorized (401). Your session may have expired. Run 'graph logout' and sign in again.")]
    Unauthorized,

    /// API server is unreachable.
    #[error("API server is unavailable. Check your network connection or try again later.")]
    ApiUnavailable,

    /// Request timed out.
    #[error("Request timed out. The server may be slow or unreachable. Try again later.")]
    Timeout,

    /// Network error during an HTTP request.
    #[error("Network error: {0}. Check your internet connection.")]
    Network(String),

    /// The configured to-do list does not exist.
    #[error("Task list '{0}' not found. Set api.todo_list to an existing list name.")]
    TaskListNotFound(String),

    /// Failed to access the OS keyring.
    #[error("Failed to access credential storage: {0}. Ensure your system keyring is unlocked.")]
    CredentialStorage(String),

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON or TOML serialization/deserialization failed.
    #[error("Data serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// Checks if this error can only be resolved by running the device-code flow again.
    #[must_use]
    pub const fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::AuthRequestFailed(_)
                | Self::DeviceAuthorizationExpired
                | Self::AccessDenied
                | Self::Unauthorized
        )
    }

    /// Checks if this error is transient and the operation might succeed on retry.
    ///
    /// Nothing in the crate retries on its own; the menu prints the error and the
    /// operator decides.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationPending
                | Self::SlowDown
                | Self::Network(_)
                | Self::Timeout
                | Self::ApiUnavailable
        )
    }
}

/// Result type alias using [`GraphError`].
pub type Result<T> = std::result::Result<T, GraphError>;

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for GraphError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigRead(format!("TOML parse error: {err}"))
    }
}

impl From<keyring::Error> for GraphError {
    fn from(err: keyring::Error) -> Self {
        Self::CredentialStorage(err.to_string())
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ApiUnavailable
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for GraphError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::Network(e.to_string()),
        }
    }
}
