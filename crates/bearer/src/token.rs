//! JWT issue and verify
//!
//! The claims are deliberately small: the subject (Google id) is the only
//! identity field, and consumers re-fetch the user record from the store
//! rather than trusting anything else embedded in the token. `exp` matches
//! the revocation store's retention window, so a revoked token's denylist
//! entry outlives the token itself.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Seconds a bearer token stays valid after issuance.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's Google id
    pub sub: String,
    /// Issuance time, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds (`iat + TOKEN_TTL_SECS`)
    pub exp: i64,
}

/// Mint a signed bearer token for the given user identity.
///
/// The signature is deterministic for a fixed secret and claims; only the
/// embedded timestamps vary between calls.
pub fn issue(secret: &[u8], user_id: &str) -> Result<String> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_owned(),
        iat,
        exp: iat + TOKEN_TTL_SECS,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| Error::Signing(e.to_string()))
}

/// Verify a presented token and return its claims.
///
/// Signature and structure are checked before any claim is readable. This
/// does not consult the revocation store — callers compose that check.
pub fn verify(secret: &[u8], token: &str) -> Result<Claims> {
    let validation = Validation::new(Algorithm::HS256);

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => Error::InvalidSignature,
            ErrorKind::ExpiredSignature => Error::Expired,
            _ => Error::Malformed,
        })
}
