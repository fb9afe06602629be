//! Bearer credential issuing and verification
//!
//! Mints and validates the signed tokens clients present on guarded requests.
//! Tokens are HS256 JWTs carrying the user's Google id and issuance time,
//! signed with a process-wide secret. Verification checks signature and
//! structure only — revocation is a separate store consulted by the access
//! guard, because a token stays cryptographically valid after logout.

mod error;
mod token;

pub use error::{Error, Result};
pub use token::{Claims, TOKEN_TTL_SECS, issue, verify};
