//! Authorization URL construction and code exchange
//!
//! The browser half of the flow is a redirect to the authorization endpoint
//! with a random `state` for CSRF protection; the server half is a form POST
//! exchanging the returned code for tokens. Offline access and forced
//! re-consent are always requested so a refresh token is granted on every
//! login, not just the first.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GoogleConfig;
use crate::constants::SCOPES;
use crate::error::{Error, Result};

/// Response from the token endpoint.
///
/// `expires_in` is a delta in seconds from the response time. The gateway
/// stores a fixed one-hour estimate instead of trusting it, because the
/// provider omits it on some repeat-consent responses; the field is still
/// deserialized so callers can log what was actually granted.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Present when offline access was granted (we always request it)
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: Option<u64>,
    /// Space-separated scopes actually granted
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// Generate a cryptographically random CSRF state value.
///
/// 32 random bytes encoded as URL-safe base64 (no padding) — opaque to the
/// provider, round-tripped unchanged in the callback.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL with all required OAuth parameters.
///
/// `access_type=offline` requests a refresh token; `prompt=consent` forces
/// the consent screen so the refresh token is re-issued on repeat logins.
pub fn build_authorization_url(config: &GoogleConfig, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
        config.authorize_endpoint,
        config.client_id,
        urlencoded(&config.redirect_uri),
        urlencoded(SCOPES),
        state,
    )
}

/// Exchange an authorization code for tokens.
///
/// Called from the callback handler once the provider has redirected back
/// with a code. The client secret proves this server initiated the flow.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &GoogleConfig,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_endpoint)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &config.client_id),
            ("client_secret", config.client_secret.expose()),
            ("redirect_uri", &config.redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    debug!(
        refresh_granted = token.refresh_token.is_some(),
        scope = token.scope.as_deref().unwrap_or(""),
        "authorization code exchanged"
    );
    Ok(token)
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}
