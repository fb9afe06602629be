//! Google OAuth2 authentication library
//!
//! Drives the external half of the login handshake: building the
//! authorization URL the client is redirected to, exchanging the callback's
//! authorization code for tokens, and fetching the verified profile behind
//! the granted access token. This crate is a standalone library with no
//! dependency on the service binary — it can be tested and used
//! independently.
//!
//! Login flow:
//! 1. Service calls `oauth::generate_state()` and stores it pending
//! 2. Client is redirected via `oauth::build_authorization_url()`
//! 3. Google redirects back with a code (or an explicit denial)
//! 4. Service calls `oauth::exchange_code()` with the code
//! 5. Service calls `profile::fetch_profile()` with the access token
//!
//! All endpoints live on an explicitly constructed [`GoogleConfig`] rather
//! than process-global state, so deployments pick their callback URL per
//! environment and tests point the flow at a local server.

pub mod config;
pub mod constants;
pub mod error;
pub mod oauth;
pub mod profile;

pub use config::GoogleConfig;
pub use constants::SCOPES;
pub use error::{Error, Result};
pub use oauth::{TokenResponse, build_authorization_url, exchange_code, generate_state};
pub use profile::{Profile, fetch_profile};
