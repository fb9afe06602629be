//! Error types for bearer credential operations

/// Verification and issuance failures.
///
/// Every failure mode is an explicit rejection — a token is never usable
/// unless `verify` returned its claims.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Result alias for bearer operations.
pub type Result<T> = std::result::Result<T, Error>;
