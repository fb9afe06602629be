//! Error types for OAuth operations

/// Errors from the external login handshake.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("profile fetch failed: {0}")]
    Profile(String),
}

/// Result alias for OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
